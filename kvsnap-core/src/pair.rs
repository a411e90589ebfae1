/*!
Key/value pairs and the ordered snapshots built from them.
*/

use std::fmt;

/// A single entry of the store. Both halves are opaque bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KvPair {
    /// Create a new pair from anything convertible to bytes
    ///
    /// # Example
    /// ```rust
    /// use kvsnap_core::KvPair;
    ///
    /// let pair = KvPair::new("service/web/port", "8080");
    /// assert_eq!(pair.key, b"service/web/port");
    /// ```
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Key rendered for logs and reports; invalid UTF-8 is replaced.
    pub fn key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

impl fmt::Debug for KvPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvPair")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("value_len", &self.value.len())
            .finish()
    }
}

/// Ordered sequence of pairs captured from the store at one point in time.
///
/// Order is whatever the store listing returned; nothing here sorts or
/// deduplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pairs: Vec<KvPair>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Wrap an already ordered list of pairs
    pub fn from_pairs(pairs: Vec<KvPair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[KvPair] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<KvPair> {
        self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KvPair> {
        self.pairs.iter()
    }

    pub(crate) fn push(&mut self, pair: KvPair) {
        self.pairs.push(pair);
    }

    /// Sum of all key lengths in bytes
    pub fn key_bytes(&self) -> usize {
        self.pairs.iter().map(|p| p.key.len()).sum()
    }

    /// Sum of all value lengths in bytes
    pub fn value_bytes(&self) -> usize {
        self.pairs.iter().map(|p| p.value.len()).sum()
    }
}

impl From<Vec<KvPair>> for Snapshot {
    fn from(pairs: Vec<KvPair>) -> Self {
        Self::from_pairs(pairs)
    }
}

impl FromIterator<KvPair> for Snapshot {
    fn from_iter<I: IntoIterator<Item = KvPair>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Snapshot {
    type Item = KvPair;
    type IntoIter = std::vec::IntoIter<KvPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a KvPair;
    type IntoIter = std::slice::Iter<'a, KvPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}
