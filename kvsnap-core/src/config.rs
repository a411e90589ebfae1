//! Configuration module for the store connection
//!
//! This module turns the operator-supplied `--address` into a validated
//! connection configuration and holds the defaults shared by the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;

/// Default Consul HTTP API port
pub const DEFAULT_PORT: u16 = 8500;

/// Default backup file name, relative to the working directory
pub const DEFAULT_BACKUP_FILE: &str = "backup.kvsnap";

/// Environment variable consulted when `--address` is not given
pub const ADDRESS_ENV: &str = "CONSUL_HTTP_ADDR";

/// URL scheme used to reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// Connection settings for the key/value store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Scheme for the HTTP API (defaults to plain http)
    pub scheme: Scheme,
    /// Host name or IP of the store agent
    pub host: String,
    /// Port of the HTTP API
    pub port: u16,
    /// Key prefix to back up; empty means the whole namespace
    pub prefix: String,
}

impl StoreConfig {
    /// Parse an operator-supplied address
    ///
    /// Supports formats:
    /// - `host:port`
    /// - `host` (port defaults to 8500)
    /// - `http://host:port` or `https://host:port`
    ///
    /// # Errors
    /// Returns `KvSnapError::InvalidArgument` for an empty address, unknown
    /// scheme, empty or malformed host, bad port or a trailing path. IPv6
    /// literals must be bracketed.
    pub fn from_address(address: &str) -> crate::Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(crate::KvSnapError::invalid_argument(
                "consul address should be specified",
            ));
        }

        let (scheme, authority) = match address.split_once("://") {
            Some(("http", rest)) => (Scheme::Http, rest),
            Some(("https", rest)) => (Scheme::Https, rest),
            Some((other, _)) => {
                return Err(crate::KvSnapError::invalid_argument(format!(
                    "unsupported scheme '{other}' in address '{address}'"
                )))
            }
            None => (Scheme::Http, address),
        };

        let authority = authority.strip_suffix('/').unwrap_or(authority);
        if authority.contains('/') {
            return Err(crate::KvSnapError::invalid_argument(format!(
                "address '{address}' must not contain a path"
            )));
        }

        let (host, port) = split_host_port(authority).map_err(|msg| {
            crate::KvSnapError::invalid_argument(format!("invalid address '{address}': {msg}"))
        })?;

        let config = StoreConfig {
            scheme,
            host,
            port,
            prefix: String::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the key prefix to operate on
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// `host:port` as shown in logs and error messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL of the HTTP API, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::KvSnapError::invalid_argument(
                "store address requires a host",
            ));
        }
        if !is_valid_host(&self.host) {
            return Err(crate::KvSnapError::invalid_argument(format!(
                "invalid host '{}'",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(crate::KvSnapError::invalid_argument(
                "store port must be non-zero",
            ));
        }
        Ok(())
    }
}

fn split_host_port(authority: &str) -> std::result::Result<(String, u16), String> {
    // Bracketed IPv6 literal, e.g. [::1]:8500
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| "unterminated IPv6 literal".to_string())?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if tail.is_empty() => DEFAULT_PORT,
            None => return Err(format!("unexpected '{tail}' after IPv6 literal")),
        };
        return Ok((format!("[{host}]"), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
        None => Ok((authority.to_string(), DEFAULT_PORT)),
    }
}

/// Host names and IPv4 literals as-is, IPv6 only inside brackets.
fn is_valid_host(host: &str) -> bool {
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return inner.parse::<Ipv6Addr>().is_ok();
    }
    host.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'))
}

fn parse_port(port: &str) -> std::result::Result<u16, String> {
    port.parse::<u16>()
        .map_err(|_| format!("port '{port}' is not a number between 1 and 65535"))
}
