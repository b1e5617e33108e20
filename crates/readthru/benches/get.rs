// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Benchmarks for `ReadThroughCache::get`.
//!
//! Run with: cargo bench -p readthru
//! Save baseline: cargo bench -p readthru -- --save-baseline main
//! Compare to baseline: cargo bench -p readthru -- --baseline main

#![allow(missing_docs, reason = "benchmark code")]

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use criterion::{Criterion, criterion_group, criterion_main};
use futures::future::join_all;
use readthru::{ByteSink, Getter, LruStore, ReadThroughCache, SourceError, Value, View, getter_fn};
use tick::Clock;

static KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

fn fresh_key() -> String {
    format!("key_{}", KEY_COUNTER.fetch_add(1, Ordering::Relaxed))
}

fn payload_getter() -> impl Getter<()> + use<> {
    getter_fn(|_key: String| async { Ok::<_, SourceError>(View::<()>::new(Value::bytes(vec![7_u8; 256]))) })
}

fn cache(capacity: usize) -> Arc<ReadThroughCache<(), LruStore<()>, impl Getter<()> + use<>>> {
    let clock = Clock::new_frozen();
    Arc::new(
        ReadThroughCache::builder::<()>(clock.clone())
            .store(LruStore::builder(capacity, clock).bytes())
            .getter(payload_getter())
            .build()
            .expect("valid configuration"),
    )
}

/// Lookup answered from the store.
fn bench_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let cache = cache(16);
    rt.block_on(async {
        let mut buf = Vec::new();
        cache.get("warm", &mut ByteSink::new(&mut buf)).await.expect("warm-up load");
    });

    c.bench_function("get_hit", |b| {
        b.to_async(&rt).iter(|| {
            let cache = Arc::clone(&cache);
            async move {
                let mut buf = Vec::new();
                cache.get("warm", &mut ByteSink::new(&mut buf)).await.expect("hit");
                buf
            }
        });
    });
}

/// Every lookup misses and runs a load, including the store write and any eviction.
fn bench_miss(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let cache = cache(1_024);

    c.bench_function("get_miss", |b| {
        b.to_async(&rt).iter(|| {
            let cache = Arc::clone(&cache);
            async move {
                let mut buf = Vec::new();
                cache.get(&fresh_key(), &mut ByteSink::new(&mut buf)).await.expect("load");
                buf
            }
        });
    });
}

/// 64 callers miss the same key together and share one load.
fn bench_coalesced_miss(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let cache = cache(1_024);

    c.bench_function("get_coalesced_miss_64", |b| {
        b.to_async(&rt).iter(|| {
            let cache = Arc::clone(&cache);
            async move {
                let key = fresh_key();
                let results = join_all((0..64).map(|_| {
                    let cache = Arc::clone(&cache);
                    let key = key.clone();
                    async move {
                        let mut buf = Vec::new();
                        let result = cache.get(&key, &mut ByteSink::new(&mut buf)).await;
                        result.map(|()| buf)
                    }
                }))
                .await;
                for result in results {
                    result.expect("load");
                }
            }
        });
    });
}

criterion_group!(benches, bench_hit, bench_miss, bench_coalesced_miss);

criterion_main!(benches);
