/*!
Error types for the kvsnap core engine.
*/

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the kvsnap core.
pub type Result<T> = std::result::Result<T, KvSnapError>;

/// Errors raised while decoding a backup record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A header, length prefix or payload runs past the end of input
    #[error("truncated backup record: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: u64,
        available: usize,
    },

    /// The record does not start with the kvsnap magic bytes
    #[error("not a kvsnap backup record (bad magic bytes)")]
    BadMagic,

    /// The record was written by an unknown format version
    #[error("unsupported backup record version: {0}")]
    UnsupportedVersion(u8),
}

/// Errors that can occur during backup and restore operations.
#[derive(Error, Debug)]
pub enum KvSnapError {
    /// Missing or malformed command arguments (e.g. the store address)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store could not be reached or the listing failed
    #[error("Store at {address} unavailable: {message}")]
    StoreUnavailable { address: String, message: String },

    /// A single key could not be written during restore
    #[error("Failed to restore key '{key}': {message}")]
    PutFailed { key: String, message: String },

    /// The backup file could not be created, read or written
    #[error("File error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backup file is not a valid record
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Every put of a restore failed
    #[error("Restore failed: all {attempted} writes were rejected")]
    RestoreFailed { attempted: usize },
}

impl KvSnapError {
    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new store unavailable error
    pub fn store_unavailable<A: Into<String>, S: Into<String>>(address: A, msg: S) -> Self {
        Self::StoreUnavailable {
            address: address.into(),
            message: msg.into(),
        }
    }

    /// Create a new put failure for a key given as raw bytes
    pub fn put_failed<S: Into<String>>(key: &[u8], msg: S) -> Self {
        Self::PutFailed {
            key: String::from_utf8_lossy(key).into_owned(),
            message: msg.into(),
        }
    }

    /// Create a new file I/O error bound to a path
    pub fn file_io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}
