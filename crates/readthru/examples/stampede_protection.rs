// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stampede protection: many concurrent requests for the same missing key reach the backend
//! once. The first request loads the value; the others wait and receive their own copy.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use readthru::{Getter, LruStore, ReadThroughCache, Sink, SourceError, StringSink};
use tick::Clock;

#[derive(Debug, Clone)]
struct SlowBackend {
    calls: Arc<AtomicU32>,
    clock: Clock,
}

impl Getter<()> for SlowBackend {
    async fn get(&self, key: &str, sink: &mut dyn Sink<()>) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.clock.delay(Duration::from_millis(50)).await;
        sink.set_string(&format!("value_for_{key}"))?;
        sink.set_ttl(Duration::from_secs(30));
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let clock = Clock::new_tokio();
    let backend = SlowBackend {
        calls: Arc::new(AtomicU32::new(0)),
        clock: clock.clone(),
    };

    let cache = Arc::new(
        ReadThroughCache::builder::<()>(clock.clone())
            .store(LruStore::builder(1_000, clock).bytes())
            .getter(backend.clone())
            .rate_limit(10)
            .name("stampede_demo")
            .build()
            .expect("valid configuration"),
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            let mut value = String::new();
            let result = cache.get("contested_key", &mut StringSink::new(&mut value)).await;
            result.map(|()| value)
        }));
    }
    for handle in handles {
        let value = handle.await.expect("task panicked").expect("load succeeded");
        assert_eq!(value, "value_for_contested_key");
    }

    let stats = cache.stats();
    println!("10 concurrent requests: {} backend call(s)", backend.calls.load(Ordering::Relaxed));
    println!("misses: {}, source attempts: {}", stats.miss, stats.source_attempt);
}
