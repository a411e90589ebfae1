/*!
Storage adapters for backup record files.

The engine treats the backup file as an opaque blob: it hands the encoded
record to a `RecordStore` and gets the same bytes back on restore. Keeping
this behind a trait lets the orchestration be tested without touching the
filesystem.
*/

pub mod local;

use crate::Result;
use std::path::Path;

/// Storage abstraction for saving and loading backup records
pub trait RecordStore {
    /// Save a record to the specified location
    ///
    /// Implementations must be atomic: after an error, whatever was stored
    /// at `path` before the call is still there unchanged.
    ///
    /// # Arguments
    /// * `data` - The encoded backup record
    /// * `path` - The storage location
    fn save(&self, data: &[u8], path: &Path) -> Result<()>;

    /// Load a whole record from the specified location
    fn load(&self, path: &Path) -> Result<Vec<u8>>;

    /// Check if a record exists at the specified location
    fn exists(&self, path: &Path) -> bool;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn save(&self, data: &[u8], path: &Path) -> Result<()> {
        (**self).save(data, path)
    }

    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).load(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

pub use local::LocalFileStorage;

/// Memory-based record storage for testing
///
/// Stores records in a HashMap keyed by path. `fail_writes` makes every
/// save return an I/O error without touching the stored data.
#[cfg(test)]
pub struct MemoryStorage {
    data: std::sync::Mutex<std::collections::HashMap<std::path::PathBuf, Vec<u8>>>,
    fail_writes: bool,
}

#[cfg(test)]
impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: std::sync::Mutex::new(std::collections::HashMap::new()),
            fail_writes: false,
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub fn insert(&self, path: &Path, data: &[u8]) {
        self.data
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), data.to_vec());
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(path).cloned()
    }
}

#[cfg(test)]
impl RecordStore for MemoryStorage {
    fn save(&self, data: &[u8], path: &Path) -> Result<()> {
        if self.fail_writes {
            return Err(crate::KvSnapError::file_io(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        self.insert(path, data);
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        self.get(path).ok_or_else(|| {
            crate::KvSnapError::file_io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "record not found"),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.data.lock().unwrap().contains_key(path)
    }
}
