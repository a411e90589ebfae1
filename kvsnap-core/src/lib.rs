/*!
# kvsnap Core Engine

Backup and restore for Consul-style key/value stores.

This crate provides:

- A length-prefixed backup record format that round-trips arbitrary bytes
- A `KvStore` port with a Consul HTTP API adapter
- Atomic local record storage
- The `BackupEngine` orchestrating backup, restore, verify and inspect

## Architecture

The engine only sees two traits: `KvStore` for the network side and
`RecordStore` for the file side. Both are swapped for in-memory versions in
tests.

## Usage

```rust,no_run
use kvsnap_core::{BackupEngine, ConsulClient, LocalFileStorage, OperationContext, StoreConfig};
use std::path::Path;

let config = StoreConfig::from_address("127.0.0.1:8500")?;
let engine = BackupEngine::new(ConsulClient::new(config.clone())?, LocalFileStorage::new());

// Save the whole namespace
let ctx = OperationContext::for_store("backup", &config);
engine.backup(&ctx, Path::new("backup.kvsnap"))?;

// Replay it
let ctx = OperationContext::for_store("restore", &config);
let report = engine.restore(&ctx, Path::new("backup.kvsnap"))?;
println!("{} of {} keys restored", report.succeeded, report.attempted);
# Ok::<(), kvsnap_core::KvSnapError>(())
```
*/

pub mod config;
pub mod engine;
pub mod error;
pub mod observability;
pub mod pair;
pub mod record;
pub mod storage;
pub mod store;


pub use config::{Scheme, StoreConfig, ADDRESS_ENV, DEFAULT_BACKUP_FILE};
pub use engine::{
    verify_record, BackupEngine, BackupSummary, RecordInfo, RestoreFailure, RestoreReport,
};
pub use error::{DecodeError, KvSnapError, Result};
pub use observability::{
    build_subscriber, build_subscriber_with_writer, LogFormat, OperationContext,
};
pub use pair::{KvPair, Snapshot};
pub use storage::{LocalFileStorage, RecordStore};
#[cfg(feature = "consul")]
pub use store::ConsulClient;
pub use store::KvStore;
