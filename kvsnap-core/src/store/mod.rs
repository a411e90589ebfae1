/*!
Key/value store clients.

`KvStore` is the port the engine talks to; `ConsulClient` is the adapter
for the Consul KV HTTP API.
*/

#[cfg(feature = "consul")]
pub mod consul;

use crate::{KvPair, Result};

/// Access to the key/value store being backed up or restored
#[cfg_attr(test, mockall::automock)]
pub trait KvStore {
    /// List every pair under `prefix`, in the order the store returns them
    ///
    /// # Errors
    /// `KvSnapError::StoreUnavailable` if the store cannot be reached or the
    /// listing response is unusable.
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>>;

    /// Write a single pair, overwriting any existing value
    ///
    /// # Errors
    /// `KvSnapError::PutFailed` naming the key and the cause.
    fn put(&self, pair: &KvPair) -> Result<()>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>> {
        (**self).list(prefix)
    }

    fn put(&self, pair: &KvPair) -> Result<()> {
        (**self).put(pair)
    }
}

#[cfg(feature = "consul")]
pub use consul::ConsulClient;

/// In-memory store keeping pairs in insertion order, for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    pairs: std::sync::Mutex<Vec<KvPair>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pairs(pairs: Vec<KvPair>) -> Self {
        Self {
            pairs: std::sync::Mutex::new(pairs),
        }
    }

    pub fn contents(&self) -> Vec<KvPair> {
        self.pairs.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl KvStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>> {
        let pairs = self.pairs.lock().unwrap();
        Ok(pairs
            .iter()
            .filter(|p| p.key.starts_with(prefix.as_bytes()))
            .cloned()
            .collect())
    }

    fn put(&self, pair: &KvPair) -> Result<()> {
        let mut pairs = self.pairs.lock().unwrap();
        match pairs.iter_mut().find(|p| p.key == pair.key) {
            Some(existing) => existing.value = pair.value.clone(),
            None => pairs.push(pair.clone()),
        }
        Ok(())
    }
}
