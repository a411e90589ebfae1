/*!
Backup engine that orchestrates the backup and restore operations.

This module contains the core business logic: pulling a snapshot out of the
store and committing it as a record file, and replaying a record file into
the store key by key.
*/

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::observability::OperationContext;
use crate::record;
use crate::storage::RecordStore;
use crate::store::KvStore;
use crate::{KvSnapError, Result, Snapshot};

/// Outcome of a successful backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    /// Number of pairs written
    pub pairs: usize,
    /// Size of the record file in bytes
    pub bytes: usize,
    /// Hex SHA-256 of the record file
    pub sha256: String,
    /// Where the record was written
    pub path: PathBuf,
}

/// A key that could not be written back during restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFailure {
    pub key: String,
    pub message: String,
}

/// Outcome of a restore that wrote at least one key (or had none to write)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<RestoreFailure>,
}

impl RestoreReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when every decoded pair was written
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Summary of a record file, produced without contacting the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub pairs: usize,
    pub key_bytes: usize,
    pub value_bytes: usize,
    pub bytes: usize,
    pub sha256: String,
}

/// Main engine for backup and restore operations
///
/// # Example
/// ```rust,no_run
/// use kvsnap_core::{BackupEngine, ConsulClient, LocalFileStorage, OperationContext, StoreConfig};
/// use std::path::Path;
///
/// let config = StoreConfig::from_address("127.0.0.1:8500")?;
/// let ctx = OperationContext::for_store("backup", &config);
/// let engine = BackupEngine::new(ConsulClient::new(config)?, LocalFileStorage::new());
///
/// let summary = engine.backup(&ctx, Path::new("backup.kvsnap"))?;
/// println!("{} pairs backed up", summary.pairs);
/// # Ok::<(), kvsnap_core::KvSnapError>(())
/// ```
pub struct BackupEngine<K, F>
where
    K: KvStore,
    F: RecordStore,
{
    store: K,
    storage: F,
}

impl<K, F> BackupEngine<K, F>
where
    K: KvStore,
    F: RecordStore,
{
    /// Create a new engine over a store client and a record storage adapter
    pub fn new(store: K, storage: F) -> Self {
        Self { store, storage }
    }

    /// Back up every pair under the context's prefix into `path`
    ///
    /// This method:
    /// 1. Lists the full snapshot from the store
    /// 2. Encodes it as a backup record
    /// 3. Saves the record atomically through the storage adapter
    ///
    /// # Errors
    /// * `KvSnapError::StoreUnavailable` - The listing failed; nothing was written
    /// * `KvSnapError::FileIo` - The record could not be committed; any previous file is untouched
    pub fn backup(&self, ctx: &OperationContext, path: &Path) -> Result<BackupSummary> {
        let _guard = ctx.enter();

        let pairs = self.store.list(ctx.prefix()).map_err(|e| match e {
            KvSnapError::StoreUnavailable { .. } => e,
            other => KvSnapError::store_unavailable(ctx.address(), other.to_string()),
        })?;
        let snapshot = Snapshot::from_pairs(pairs);
        info!(count = snapshot.len(), "KV pairs found");

        for pair in &snapshot {
            debug!(key = %pair.key_lossy(), value_len = pair.value.len(), "Backing up key");
        }

        let data = record::encode(&snapshot);
        self.storage.save(&data, path)?;

        let summary = BackupSummary {
            pairs: snapshot.len(),
            bytes: data.len(),
            sha256: sha256_hex(&data),
            path: path.to_path_buf(),
        };
        info!(
            pairs = summary.pairs,
            bytes = summary.bytes,
            path = %path.display(),
            "Backup written"
        );
        Ok(summary)
    }

    /// Restore every pair recorded in `path` into the store
    ///
    /// Pairs are written in record order. A failed write is logged and
    /// recorded, and the remaining keys are still attempted.
    ///
    /// # Errors
    /// * `KvSnapError::FileIo` - The record could not be read
    /// * `KvSnapError::Decode` - The record is malformed; nothing was written
    /// * `KvSnapError::RestoreFailed` - Every single write failed
    pub fn restore(&self, ctx: &OperationContext, path: &Path) -> Result<RestoreReport> {
        let _guard = ctx.enter();

        let snapshot = load_snapshot(&self.storage, path)?;
        info!(count = snapshot.len(), "Gathered pairs from backup");

        let mut report = RestoreReport::default();
        for pair in &snapshot {
            report.attempted += 1;
            match self.store.put(pair) {
                Ok(()) => {
                    report.succeeded += 1;
                    debug!(key = %pair.key_lossy(), "Restored");
                }
                Err(e) => {
                    error!(key = %pair.key_lossy(), error = %e, "Unable to restore value for key");
                    let message = match e {
                        KvSnapError::PutFailed { message, .. } => message,
                        other => other.to_string(),
                    };
                    report.failures.push(RestoreFailure {
                        key: pair.key_lossy(),
                        message,
                    });
                }
            }
        }

        if report.attempted > 0 && report.succeeded == 0 {
            return Err(KvSnapError::RestoreFailed {
                attempted: report.attempted,
            });
        }

        if report.is_complete() {
            info!(restored = report.succeeded, "Restore completed");
        } else {
            warn!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed(),
                "Restore completed with failures"
            );
        }
        Ok(report)
    }

    /// Check that `path` holds a well-formed record
    pub fn verify(&self, ctx: &OperationContext, path: &Path) -> Result<RecordInfo> {
        verify_record(&self.storage, ctx, path)
    }

    /// Decode the record at `path` without touching the store
    pub fn inspect(&self, ctx: &OperationContext, path: &Path) -> Result<Snapshot> {
        let _guard = ctx.enter();
        load_snapshot(&self.storage, path)
    }
}

/// Load and decode a record, reporting its size and digest
///
/// Usable without a store client; the CLI's `verify` command goes through here.
pub fn verify_record<F: RecordStore>(
    storage: &F,
    ctx: &OperationContext,
    path: &Path,
) -> Result<RecordInfo> {
    let _guard = ctx.enter();

    let data = storage.load(path)?;
    let snapshot = record::decode(&data)?;

    let info = RecordInfo {
        pairs: snapshot.len(),
        key_bytes: snapshot.key_bytes(),
        value_bytes: snapshot.value_bytes(),
        bytes: data.len(),
        sha256: sha256_hex(&data),
    };
    info!(pairs = info.pairs, bytes = info.bytes, "Record verified");
    Ok(info)
}

/// Load and decode the record at `path`
pub fn load_snapshot<F: RecordStore>(storage: &F, path: &Path) -> Result<Snapshot> {
    let data = storage.load(path)?;
    let snapshot = record::decode(&data)?;
    Ok(snapshot)
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::observability::LogBuffer;
    use crate::storage::MemoryStorage;
    use crate::store::{MemoryStore, MockKvStore};
    use crate::KvPair;

    fn ctx() -> OperationContext {
        OperationContext::local("test")
    }

    fn backup_path() -> &'static Path {
        Path::new("backup.kvsnap")
    }

    fn numbered_pairs(n: usize) -> Vec<KvPair> {
        (1..=n)
            .map(|i| KvPair::new(format!("key-{i:02}"), format!("value-{i}")))
            .collect()
    }

    #[test]
    fn test_backup_restore_roundtrip() {
        let source = MemoryStore::with_pairs(vec![KvPair::new("a", "1"), KvPair::new("b", "2")]);
        let storage = MemoryStorage::new();

        let summary = BackupEngine::new(&source, &storage)
            .backup(&ctx(), backup_path())
            .unwrap();
        assert_eq!(summary.pairs, 2);
        assert_eq!(summary.bytes, storage.get(backup_path()).unwrap().len());
        assert_eq!(summary.sha256.len(), 64);

        let target = MemoryStore::new();
        let report = BackupEngine::new(&target, &storage)
            .restore(&ctx(), backup_path())
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 2);
        assert!(report.is_complete());
        assert_eq!(
            target.contents(),
            vec![KvPair::new("a", "1"), KvPair::new("b", "2")]
        );
    }

    #[test]
    fn test_backup_uses_context_prefix() {
        let source = MemoryStore::with_pairs(vec![
            KvPair::new("app/port", "80"),
            KvPair::new("db/host", "x"),
        ]);
        let storage = MemoryStorage::new();
        let config = crate::StoreConfig::from_address("localhost")
            .unwrap()
            .with_prefix("app/");
        let ctx = OperationContext::for_store("backup", &config);

        let summary = BackupEngine::new(&source, &storage)
            .backup(&ctx, backup_path())
            .unwrap();
        assert_eq!(summary.pairs, 1);
    }

    #[test]
    fn test_backup_of_empty_store_writes_header() {
        let storage = MemoryStorage::new();
        let summary = BackupEngine::new(MemoryStore::new(), &storage)
            .backup(&ctx(), backup_path())
            .unwrap();

        assert_eq!(summary.pairs, 0);
        assert_eq!(storage.get(backup_path()).unwrap(), b"KVSN\x01");
    }

    #[test]
    fn test_backup_listing_failure_leaves_file_untouched() {
        let mut store = MockKvStore::new();
        store
            .expect_list()
            .returning(|_| Err(KvSnapError::store_unavailable("10.0.0.1:8500", "connection refused")));

        let storage = MemoryStorage::new();
        storage.insert(backup_path(), b"previous backup");

        let result = BackupEngine::new(store, &storage).backup(&ctx(), backup_path());
        assert!(matches!(result, Err(KvSnapError::StoreUnavailable { .. })));
        assert_eq!(storage.get(backup_path()).unwrap(), b"previous backup");
    }

    #[test]
    fn test_backup_listing_failure_creates_nothing() {
        let mut store = MockKvStore::new();
        store
            .expect_list()
            .returning(|_| Err(KvSnapError::store_unavailable("10.0.0.1:8500", "timed out")));

        let storage = MemoryStorage::new();
        let result = BackupEngine::new(store, &storage).backup(&ctx(), backup_path());
        assert!(result.is_err());
        assert!(!storage.exists(backup_path()));
    }

    #[test]
    fn test_backup_write_failure_is_file_error() {
        let source = MemoryStore::with_pairs(vec![KvPair::new("a", "1")]);
        let storage = MemoryStorage::failing_writes();

        let result = BackupEngine::new(source, &storage).backup(&ctx(), backup_path());
        assert!(matches!(result, Err(KvSnapError::FileIo { .. })));
    }

    #[test]
    fn test_restore_continues_after_failed_put() {
        let storage = MemoryStorage::new();
        let snapshot = Snapshot::from_pairs(numbered_pairs(10));
        storage.insert(backup_path(), &record::encode(&snapshot));

        let mut store = MockKvStore::new();
        store.expect_put().times(10).returning(|pair| {
            if pair.key == b"key-07" {
                Err(KvSnapError::put_failed(&pair.key, "status code 500"))
            } else {
                Ok(())
            }
        });

        let report = BackupEngine::new(store, &storage)
            .restore(&ctx(), backup_path())
            .unwrap();

        assert_eq!(report.attempted, 10);
        assert_eq!(report.succeeded, 9);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.failures,
            vec![RestoreFailure {
                key: "key-07".to_string(),
                message: "status code 500".to_string(),
            }]
        );
    }

    #[test]
    fn test_restore_logs_each_failed_key() {
        let storage = MemoryStorage::new();
        let snapshot = Snapshot::from_pairs(numbered_pairs(3));
        storage.insert(backup_path(), &record::encode(&snapshot));

        let mut store = MockKvStore::new();
        store.expect_put().times(3).returning(|pair| {
            if pair.key == b"key-02" {
                Err(KvSnapError::put_failed(&pair.key, "status code 500"))
            } else {
                Ok(())
            }
        });

        let logs = LogBuffer::default();
        let report = logs.capture(|| {
            BackupEngine::new(store, &storage)
                .restore(&ctx(), backup_path())
                .unwrap()
        });
        assert_eq!(report.failed(), 1);

        let output = logs.contents();
        let failures: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("Unable to restore value for key"))
            .collect();
        assert_eq!(failures.len(), 1, "{output}");
        assert!(failures[0].contains(r#""level":"ERROR""#));
        assert!(failures[0].contains("key-02"));
        assert!(failures[0].contains("status code 500"));
    }

    #[test]
    fn test_restore_applies_in_record_order() {
        let storage = MemoryStorage::new();
        let snapshot = Snapshot::from_pairs(vec![
            KvPair::new("z", "1"),
            KvPair::new("a", "2"),
            KvPair::new("m", "3"),
        ]);
        storage.insert(backup_path(), &record::encode(&snapshot));

        let mut store = MockKvStore::new();
        let mut seq = mockall::Sequence::new();
        for key in ["z", "a", "m"] {
            store
                .expect_put()
                .withf(move |pair: &KvPair| pair.key == key.as_bytes())
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let report = BackupEngine::new(store, &storage)
            .restore(&ctx(), backup_path())
            .unwrap();
        assert_eq!(report.succeeded, 3);
    }

    #[test]
    fn test_restore_total_failure_is_error() {
        let storage = MemoryStorage::new();
        storage.insert(
            backup_path(),
            &record::encode(&Snapshot::from_pairs(numbered_pairs(3))),
        );

        let mut store = MockKvStore::new();
        store
            .expect_put()
            .times(3)
            .returning(|pair| Err(KvSnapError::put_failed(&pair.key, "connection refused")));

        let result = BackupEngine::new(store, &storage).restore(&ctx(), backup_path());
        assert!(matches!(
            result,
            Err(KvSnapError::RestoreFailed { attempted: 3 })
        ));
    }

    #[test]
    fn test_restore_of_empty_record_succeeds() {
        let storage = MemoryStorage::new();
        storage.insert(backup_path(), &record::encode(&Snapshot::new()));

        let mut store = MockKvStore::new();
        store.expect_put().never();

        let report = BackupEngine::new(store, &storage)
            .restore(&ctx(), backup_path())
            .unwrap();
        assert_eq!(report, RestoreReport::default());
    }

    #[test]
    fn test_restore_truncated_record_writes_nothing() {
        let storage = MemoryStorage::new();
        let data = record::encode(&Snapshot::from_pairs(numbered_pairs(2)));
        storage.insert(backup_path(), &data[..data.len() - 3]);

        let mut store = MockKvStore::new();
        store.expect_put().never();

        let result = BackupEngine::new(store, &storage).restore(&ctx(), backup_path());
        assert!(matches!(
            result,
            Err(KvSnapError::Decode(DecodeError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_restore_missing_file() {
        let storage = MemoryStorage::new();
        let result = BackupEngine::new(MemoryStore::new(), &storage).restore(&ctx(), backup_path());
        assert!(matches!(result, Err(KvSnapError::FileIo { .. })));
    }

    #[test]
    fn test_verify_and_inspect() {
        let storage = MemoryStorage::new();
        let snapshot = Snapshot::from_pairs(vec![
            KvPair::new("path with space", "value;with;semicolons"),
            KvPair::new("empty", ""),
        ]);
        let data = record::encode(&snapshot);
        storage.insert(backup_path(), &data);

        let engine = BackupEngine::new(MemoryStore::new(), &storage);
        let info = engine.verify(&ctx(), backup_path()).unwrap();
        assert_eq!(info.pairs, 2);
        assert_eq!(info.key_bytes, 20);
        assert_eq!(info.value_bytes, 21);
        assert_eq!(info.bytes, data.len());
        assert_eq!(info.sha256, sha256_hex(&data));

        assert_eq!(engine.inspect(&ctx(), backup_path()).unwrap(), snapshot);
    }

    #[test]
    fn test_verify_rejects_legacy_format() {
        let storage = MemoryStorage::new();
        storage.insert(backup_path(), b"a 1;b 2;");

        let result = verify_record(&storage, &ctx(), backup_path());
        assert!(matches!(
            result,
            Err(KvSnapError::Decode(DecodeError::BadMagic))
        ));
    }
}
