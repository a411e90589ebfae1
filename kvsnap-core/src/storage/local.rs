/*!
Local filesystem storage adapter implementation.
*/

use super::RecordStore;
use crate::{KvSnapError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Local filesystem storage adapter
///
/// Records are written to a temporary file in the destination directory,
/// flushed to disk, then renamed over the target. A crash or error mid-write
/// leaves either the previous file or no file, never a partial one.
///
/// # Example
/// ```rust,no_run
/// use kvsnap_core::storage::{LocalFileStorage, RecordStore};
/// use std::path::Path;
///
/// let storage = LocalFileStorage::new();
/// storage.save(b"KVSN\x01", Path::new("backups/backup.kvsnap"))?;
/// # Ok::<(), kvsnap_core::KvSnapError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalFileStorage {
    /// Optional base directory for all records
    base_dir: Option<PathBuf>,
}

impl LocalFileStorage {
    /// Create a new local file storage adapter without a base directory
    ///
    /// Paths provided to save/load will be used as-is.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Create a new local file storage adapter with a base directory
    ///
    /// All relative paths will be resolved against the base directory.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    /// Resolve the full path for a given storage path
    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Ensure the parent directory exists, creating it if necessary
    fn ensure_parent_dir(&self, path: &Path) -> Result<PathBuf> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(|e| KvSnapError::file_io(&parent, e))?;
        }
        Ok(parent)
    }
}

impl RecordStore for LocalFileStorage {
    fn save(&self, data: &[u8], path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        let parent = self.ensure_parent_dir(&full_path)?;

        // Same directory as the target so the final rename stays on one filesystem
        let mut tmp =
            NamedTempFile::new_in(&parent).map_err(|e| KvSnapError::file_io(&parent, e))?;
        tmp.write_all(data)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| KvSnapError::file_io(tmp.path(), e))?;

        tmp.persist(&full_path)
            .map_err(|e| KvSnapError::file_io(&full_path, e.error))?;

        debug!(path = %full_path.display(), bytes = data.len(), "Record written");
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);
        fs::read(&full_path).map_err(|e| KvSnapError::file_io(&full_path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).exists()
    }
}
