//! Hot-path benchmarks for cache queries.
//!
//! Three paths matter: a hit (one nonce read plus one locked map lookup),
//! a miss with eviction pressure, and a bypass (sentinel nonce, recompute
//! every time). The hit path is the one that earns the cache its keep.

use std::hint::black_box;
use std::num::NonZeroUsize;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use propcache::{InMemoryRegistry, InvalidationCoordinator, PropertyCache};

fn bench_hit(c: &mut Criterion) {
    let registry = Arc::new(InMemoryRegistry::new());
    let coordinator = Arc::new(InvalidationCoordinator::new(registry));
    coordinator.invalidate("cache_key.bench").unwrap();

    let cache = PropertyCache::builder(
        "cache_key.bench",
        NonZeroUsize::new(1024).unwrap(),
        |q: &u64| Ok(Some(*q * 3)),
    )
    .coordinator(coordinator)
    .build();

    cache.query(&7).unwrap();

    c.bench_function("query_hit", |b| {
        b.iter(|| black_box(cache.query(black_box(&7)).unwrap()))
    });
}

fn bench_miss_with_eviction(c: &mut Criterion) {
    let registry = Arc::new(InMemoryRegistry::new());
    let coordinator = Arc::new(InvalidationCoordinator::new(registry));
    coordinator.invalidate("cache_key.bench").unwrap();

    // Capacity one and alternating keys: every query misses and evicts.
    let cache = PropertyCache::builder(
        "cache_key.bench",
        NonZeroUsize::new(1).unwrap(),
        |q: &u64| Ok(Some(*q * 3)),
    )
    .coordinator(coordinator)
    .build();

    let mut flip = 0u64;
    c.bench_function("query_miss_evict", |b| {
        b.iter(|| {
            flip ^= 1;
            black_box(cache.query(black_box(&flip)).unwrap())
        })
    });
}

fn bench_bypass(c: &mut Criterion) {
    let registry = Arc::new(InMemoryRegistry::new());
    let coordinator = Arc::new(InvalidationCoordinator::new(registry));
    // No invalidation: the key stays unset and every query bypasses.

    let cache = PropertyCache::builder(
        "cache_key.bench",
        NonZeroUsize::new(1024).unwrap(),
        |q: &u64| Ok(Some(*q * 3)),
    )
    .coordinator(coordinator)
    .build();

    c.bench_function("query_bypass_unset", |b| {
        b.iter(|| black_box(cache.query(black_box(&7)).unwrap()))
    });
}

criterion_group!(benches, bench_hit, bench_miss_with_eviction, bench_bypass);
criterion_main!(benches);
