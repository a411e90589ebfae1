/*!
Consul KV HTTP API client.

Uses the blocking `ureq` agent: one listing call per backup, one PUT per key
on restore. Requests are not retried and no timeout is set beyond the agent
defaults.
*/

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing::{debug, info};

use super::KvStore;
use crate::config::StoreConfig;
use crate::{KvPair, KvSnapError, Result};

/// Upper bound on a listing response body
const MAX_LISTING_BYTES: u64 = 1 << 30;

/// One entry of a `GET /v1/kv/?recurse` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulEntry {
    key: String,
    /// Base64 payload; `null` for empty values and folders
    value: Option<String>,
}

/// Client for the Consul key/value HTTP API
///
/// # Example
/// ```rust,no_run
/// use kvsnap_core::{ConsulClient, KvStore, StoreConfig};
///
/// let config = StoreConfig::from_address("127.0.0.1:8500")?;
/// let client = ConsulClient::new(config)?;
/// let pairs = client.list("")?;
/// # Ok::<(), kvsnap_core::KvSnapError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConsulClient {
    agent: ureq::Agent,
    config: StoreConfig,
}

impl ConsulClient {
    /// Create a client for the store described by `config`
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let agent = ureq::Agent::new_with_config(ureq::Agent::config_builder().build());

        debug!(address = %config.address(), "Store client configured");
        Ok(Self { agent, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn kv_url(&self, key: &[u8]) -> String {
        format!("{}/v1/kv/{}", self.config.base_url(), encode_key_path(key))
    }

    fn unavailable<S: Into<String>>(&self, msg: S) -> KvSnapError {
        KvSnapError::store_unavailable(self.config.address(), msg)
    }
}

impl KvStore for ConsulClient {
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>> {
        let url = self.kv_url(prefix.as_bytes());
        info!(address = %self.config.address(), prefix, "Acquiring data from store");
        debug!(url = %url, "Listing keys");

        let mut response = match self.agent.get(&url).query("recurse", "true").call() {
            Ok(response) => response,
            // Consul answers 404 when nothing lives under the prefix
            Err(ureq::Error::StatusCode(404)) => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(format!("listing failed: {e}"))),
        };

        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_LISTING_BYTES)
            .read_to_vec()
            .map_err(|e| self.unavailable(format!("failed to read listing: {e}")))?;

        parse_listing(&body).map_err(|msg| self.unavailable(msg))
    }

    fn put(&self, pair: &KvPair) -> Result<()> {
        let url = self.kv_url(&pair.key);

        let mut response = self
            .agent
            .put(&url)
            .send(&pair.value[..])
            .map_err(|e| KvSnapError::put_failed(&pair.key, e.to_string()))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| KvSnapError::put_failed(&pair.key, format!("failed to read response: {e}")))?;

        if body.trim() != "true" {
            return Err(KvSnapError::put_failed(
                &pair.key,
                format!("store rejected write: {}", body.trim()),
            ));
        }
        Ok(())
    }
}

/// Decode a recursive listing body into pairs, preserving response order.
pub(crate) fn parse_listing(body: &[u8]) -> std::result::Result<Vec<KvPair>, String> {
    let entries: Vec<ConsulEntry> =
        serde_json::from_slice(body).map_err(|e| format!("malformed listing response: {e}"))?;

    entries
        .into_iter()
        .map(|entry| {
            let value = match entry.value {
                Some(encoded) => BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| format!("invalid base64 value for key '{}': {e}", entry.key))?,
                None => Vec::new(),
            };
            Ok(KvPair::new(entry.key, value))
        })
        .collect()
}

/// Percent-encode a key for use as a URL path; `/` separators are kept.
pub(crate) fn encode_key_path(key: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(key.len());
    for &b in key {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => {
                out.push('%');
                out.push(HEX[(b >> 4) as usize] as char);
                out.push(HEX[(b & 0x0F) as usize] as char);
            }
        }
    }
    out
}
