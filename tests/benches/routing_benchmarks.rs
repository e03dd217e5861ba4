//! # Routing Benchmarks
//!
//! | Operation | Expected cost |
//! |-----------|---------------|
//! | `build_partition` | O(connections), once per pool |
//! | `hash_slot` | one CRC-32 over the key |
//! | `HashSlotPartition::resolve` | hash + linear scan of boundaries |
//! | `ShardingConnectionProvider` routing | resolve + scope lookup |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tx_core::{
    build_partition, hash_slot, shard_key_from, ConnectionProvider, HashSlotPartition,
    MockBackend, Scope, ScopeKey, ShardingConnectionProvider, DEFAULT_MAX_SLOT,
};

fn random_keys(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| format!("user{}", rng.gen::<u64>()))
        .collect()
}

// ============================================================================
// PARTITION CONSTRUCTION
// ============================================================================

fn bench_build_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("build-partition");

    for connections in [2usize, 16, 128, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(connections),
            &connections,
            |b, &connections| {
                b.iter(|| black_box(build_partition(connections, DEFAULT_MAX_SLOT).is_ok()))
            },
        );
    }

    group.finish();
}

// ============================================================================
// SHARD KEY RESOLUTION
// ============================================================================

fn bench_hash_slot(c: &mut Criterion) {
    let keys = random_keys(1_000);
    let mut group = c.benchmark_group("hash-slot");
    group.throughput(Throughput::Elements(keys.len() as u64));

    group.bench_function("crc32_mod_max_slot", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(hash_slot(key.as_bytes(), DEFAULT_MAX_SLOT));
            }
        })
    });

    group.finish();
}

fn bench_partition_resolve(c: &mut Criterion) {
    let keys = random_keys(1_000);
    let mut group = c.benchmark_group("partition-resolve");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(keys.len() as u64));

    for connections in [2usize, 16, 128] {
        let partition = match HashSlotPartition::new(connections, DEFAULT_MAX_SLOT) {
            Ok(partition) => partition,
            Err(e) => panic!("partition for {connections} connections: {e}"),
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(connections),
            &partition,
            |b, partition| {
                b.iter(|| {
                    for key in &keys {
                        black_box(partition.resolve(key.as_bytes()).is_ok());
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_sharded_connection_lookup(c: &mut Criterion) {
    let key = ScopeKey::<String>::new("user_id");
    let connections: Vec<Arc<MockBackend>> = (0..8)
        .map(|i| Arc::new(MockBackend::new(format!("shard-{i}"))))
        .collect();
    let provider = match ShardingConnectionProvider::new(
        connections,
        DEFAULT_MAX_SLOT,
        shard_key_from(key.clone()),
    ) {
        Ok(provider) => provider,
        Err(e) => panic!("sharding provider: {e}"),
    };
    let scopes: Vec<Scope> = random_keys(1_000)
        .into_iter()
        .map(|user| Scope::new().with(&key, user))
        .collect();

    let mut group = c.benchmark_group("sharded-connection-lookup");
    group.throughput(Throughput::Elements(scopes.len() as u64));

    group.bench_function("current_connection", |b| {
        b.iter(|| {
            for scope in &scopes {
                black_box(provider.current_connection(scope).is_ok());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_build_partition,
    bench_hash_slot,
    bench_partition_resolve,
    bench_sharded_connection_lookup,
);

criterion_main!(benches);
