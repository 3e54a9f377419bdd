//! Benchmarks for appendkv store operations

use appendkv::{Store, StoreConfig, SyncStrategy};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Store {
    let config = StoreConfig::builder()
        .root_dir(dir.path())
        .version("bench")
        .sync_strategy(SyncStrategy::OsManaged)
        .build();
    Store::open(config).unwrap()
}

fn store_benchmarks(c: &mut Criterion) {
    let value = vec![0xABu8; 256];

    // Single key write throughput (fresh keys, no sync)
    c.bench_function("put_256b", |b| {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let mut i = 0u64;
        b.iter(|| {
            store.put(&format!("key{}", i), &value).unwrap();
            i += 1;
        });
    });

    // Random-ish read throughput over 10k entries
    c.bench_function("get_256b", |b| {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        for i in 0..10_000 {
            store.put(&format!("key{}", i), &value).unwrap();
        }
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key{}", (i * 7919) % 10_000);
            store.get(&key).unwrap().unwrap();
            i += 1;
        });
    });

    // Reopen: index replay of 10k records
    c.bench_function("reopen_10k", |b| {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir);
            for i in 0..10_000 {
                store.put(&format!("key{}", i), &value).unwrap();
            }
        }
        b.iter_batched(
            || (),
            |()| {
                let store = open_store(&dir);
                assert_eq!(store.size(), Some(10_000));
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, store_benchmarks);
criterion_main!(benches);
