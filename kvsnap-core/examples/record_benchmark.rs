/*!
Simple benchmark example for hyperfine performance testing.

Encodes a synthetic configuration namespace, commits it through the local
storage adapter and decodes it back.
*/

use kvsnap_core::{record, KvPair, LocalFileStorage, RecordStore, Snapshot};
use std::path::Path;
use std::time::Instant;

fn main() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let storage = LocalFileStorage::with_base_dir(temp_dir.path());

    // Keys shaped like a service catalogue, values with delimiter bytes
    let snapshot: Snapshot = (0..10_000)
        .map(|i| {
            KvPair::new(
                format!("services/svc-{:04}/config/entry {}", i % 500, i),
                format!("host=10.0.{}.{};port={}\nflags=\0{}", i / 256 % 256, i % 256, 8000 + i % 1000, i),
            )
        })
        .collect();
    let path = Path::new("benchmark.kvsnap");

    let start = Instant::now();

    let data = record::encode(&snapshot);
    storage.save(&data, path).unwrap();
    let loaded = record::decode(&storage.load(path).unwrap()).unwrap();

    let duration = start.elapsed();

    // Verify correctness
    assert_eq!(loaded, snapshot);

    println!("Benchmark operation completed in: {:?}", duration);
    println!("Pairs: {}", snapshot.len());
    println!(
        "Payload size: {} bytes",
        snapshot.key_bytes() + snapshot.value_bytes()
    );
    println!("Record size: {} bytes", data.len());
}
