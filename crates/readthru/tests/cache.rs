// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `ReadThroughCache`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::join_all;
use readthru::{
    ByteSink, CacheStore, Error, Getter, LruStore, ObjectSink, ReadThroughCache, Sink, SourceError, StoreError, StringSink, Value,
    View, getter_fn,
};
use readthru_store::testing::{MockStore, StoreOp};
use tick::{Clock, ClockControl};

const LOAD_DELAY: Duration = Duration::from_millis(20);

/// A getter that counts its calls and answers `value of <key>` after a short delay.
fn text_getter(calls: &Arc<AtomicUsize>) -> impl Getter<()> + use<> {
    let calls = Arc::clone(calls);
    getter_fn(move |key: String| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(LOAD_DELAY).await;
            Ok::<_, SourceError>(View::<()>::new(Value::text(format!("value of {key}"))))
        }
    })
}

fn byte_store(clock: Clock) -> LruStore<()> {
    LruStore::builder(64, clock).bytes()
}

async fn get_string<S, G>(cache: &ReadThroughCache<(), S, G>, key: &str) -> Result<String, Error>
where
    S: CacheStore<()> + 'static,
    G: Getter<()> + 'static,
{
    let mut value = String::new();
    cache.get(key, &mut StringSink::new(&mut value)).await?;
    Ok(value)
}

#[tokio::test]
async fn concurrent_misses_load_once() {
    const CALLERS: usize = 25;
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(byte_store(Clock::new_frozen()))
        .getter(text_getter(&calls))
        .build()
        .unwrap();

    let results = join_all((0..CALLERS).map(|_| get_string(&cache, "hot"))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap(), "value of hot");
    }

    let stats = cache.stats();
    assert_eq!(stats.get, CALLERS as u64);
    assert_eq!(stats.miss, CALLERS as u64);
    assert_eq!(stats.source_attempt, 1);
    assert_eq!(stats.source_hit, 1);
    assert_eq!(stats.hit, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_misses_load_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(
        ReadThroughCache::builder::<()>(Clock::new_frozen())
            .store(byte_store(Clock::new_frozen()))
            .getter(text_getter(&calls))
            .build()
            .unwrap(),
    );

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { get_string(&*cache, "hot").await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "value of hot");
    }

    // Late callers either join the load or hit the value it stored.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().get, 50);
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Profile {
    name: String,
    tags: Vec<String>,
}

fn profile_getter(calls: &Arc<AtomicUsize>) -> impl Getter<Profile> + use<> {
    let calls = Arc::clone(calls);
    getter_fn(move |key: String| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(LOAD_DELAY).await;
            let profile = Profile {
                name: key,
                tags: vec!["admin".to_owned()],
            };
            Ok::<_, SourceError>(View::new(Value::object(profile)))
        }
    })
}

#[tokio::test]
async fn followers_receive_private_copies() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<Profile>(Clock::new_frozen())
        .store(LruStore::builder(8, Clock::new_frozen()).objects())
        .getter(profile_getter(&calls))
        .build()
        .unwrap();

    let results = join_all((0..3).map(|_| async {
        let mut profile = Profile::default();
        let result = cache.get("alice", &mut ObjectSink::new(&mut profile)).await;
        result.map(|()| profile)
    }))
    .await;
    let mut profiles: Vec<Profile> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    profiles[0].name.push_str("-edited");
    profiles[0].tags.push("intruder".to_owned());

    assert_eq!(profiles[1].name, "alice");
    assert_eq!(profiles[2].tags, ["admin"]);
}

#[tokio::test]
async fn mutating_a_delivered_object_does_not_change_the_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<Profile>(Clock::new_frozen())
        .store(LruStore::builder(8, Clock::new_frozen()).objects())
        .getter(profile_getter(&calls))
        .build()
        .unwrap();

    let mut first = Profile::default();
    cache.get("bob", &mut ObjectSink::new(&mut first)).await.unwrap();
    first.name = "mallory".to_owned();
    first.tags.clear();

    let mut second = Profile::default();
    cache.get("bob", &mut ObjectSink::new(&mut second)).await.unwrap();
    assert_eq!(second.name, "bob");
    assert_eq!(second.tags, ["admin"]);
    assert_eq!(cache.stats().hit, 1);
}

#[tokio::test]
async fn mutating_delivered_bytes_does_not_change_the_cache() {
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(byte_store(Clock::new_frozen()))
        .getter(getter_fn(|_key: String| async { Ok::<_, SourceError>(View::<()>::new(Value::bytes(vec![1_u8, 2, 3]))) }))
        .build()
        .unwrap();

    let mut first = Vec::new();
    cache.get("blob", &mut ByteSink::new(&mut first)).await.unwrap();
    first[0] = 99;
    first.push(4);

    let mut second = Vec::new();
    cache.get("blob", &mut ByteSink::new(&mut second)).await.unwrap();
    assert_eq!(second, [1, 2, 3]);
}

#[tokio::test]
async fn exhausted_rate_limit_rejects_every_caller() {
    let control = ClockControl::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<()>(control.to_clock())
        .store(byte_store(control.to_clock()))
        .getter(text_getter(&calls))
        .rate_limit(1)
        .build()
        .unwrap();

    // Drain the bucket.
    assert_eq!(get_string(&cache, "first").await.unwrap(), "value of first");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let results = join_all((0..5).map(|_| get_string(&cache, "second"))).await;
    for result in results {
        assert!(result.unwrap_err().is_backpressure());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().source_attempt, 1);
    assert!(cache.store().get("second").unwrap().is_none());

    control.advance(Duration::from_secs(1));
    assert_eq!(get_string(&cache, "second").await.unwrap(), "value of second");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn set_delete_and_failing_reload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(byte_store(Clock::new_frozen()))
        .getter(getter_fn(move |key: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(LOAD_DELAY).await;
                if key == "k" {
                    return Err(SourceError::from_message("not configured"));
                }
                Ok(View::<()>::new(Value::text(key)))
            }
        }))
        .build()
        .unwrap();

    cache.store().set("k", Value::text("v"), Some(Duration::ZERO)).unwrap();
    assert_eq!(get_string(&cache, "k").await.unwrap(), "v");
    assert_eq!(cache.stats().hit, 1);

    cache.delete("k").unwrap();
    let results = join_all((0..4).map(|_| get_string(&cache, "k"))).await;
    for result in results {
        let error = result.unwrap_err();
        assert!(error.to_string().contains("not configured"), "{error}");
        let source = error.source_error().expect("source error");
        assert!(source.to_string().contains("not configured"), "{source}");
    }

    let stats = cache.stats();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(stats.source_err, 1);
    assert_eq!(stats.del, 1);
    assert!(cache.store().get("k").unwrap().is_none());
}

#[tokio::test]
async fn backend_errors_fall_through_to_the_source() {
    let store = MockStore::<()>::new();
    store.fail_when(|op| matches!(op, StoreOp::Get(_)));
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(store.clone())
        .getter(text_getter(&calls))
        .build()
        .unwrap();

    assert_eq!(get_string(&cache, "k").await.unwrap(), "value of k");

    let stats = cache.stats();
    assert_eq!(stats.miss, 1);
    // The initial lookup and the re-check both failed.
    assert_eq!(stats.err, 2);
    assert_eq!(stats.source_hit, 1);
    assert!(store.contains_key("k"));
    assert_eq!(
        store.operations().last(),
        Some(&StoreOp::Set {
            key: "k".to_owned(),
            shape: readthru::Shape::Text,
            ttl: None,
        })
    );
}

#[tokio::test]
async fn failed_delete_is_reported() {
    let store = MockStore::<()>::new();
    store.fail_when(|op| matches!(op, StoreOp::Delete(_)));
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(store)
        .getter(text_getter(&Arc::default()))
        .build()
        .unwrap();

    assert!(matches!(cache.delete("k"), Err(Error::Store(_))));
    let stats = cache.stats();
    assert_eq!((stats.del, stats.err), (1, 1));
}

#[tokio::test]
async fn delete_racing_a_load_leaves_the_loaded_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(byte_store(Clock::new_frozen()))
        .getter(text_getter(&calls))
        .build()
        .unwrap();

    let (loaded, deleted) = tokio::join!(get_string(&cache, "k"), async {
        tokio::time::sleep(LOAD_DELAY / 4).await;
        cache.delete("k")
    });
    assert_eq!(loaded.unwrap(), "value of k");
    deleted.unwrap();

    // The delete ran while the load was in flight, so the load's write lands afterwards.
    let stored = cache.store().get("k").unwrap().expect("entry repopulated by the load");
    assert_eq!(stored.value().as_slice(), Some(&b"value of k"[..]));

    cache.delete("k").unwrap();
    assert!(cache.store().get("k").unwrap().is_none());
}

#[tokio::test]
async fn sink_errors_are_local_to_the_caller() {
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(byte_store(Clock::new_frozen()))
        .getter(getter_fn(|_key: String| async {
            tokio::time::sleep(LOAD_DELAY).await;
            Ok::<_, SourceError>(View::<()>::new(Value::bytes(vec![0xff_u8, 0xfe])))
        }))
        .build()
        .unwrap();

    let mut bytes = Vec::new();
    let mut text = String::new();
    let mut byte_sink = ByteSink::new(&mut bytes);
    let mut text_sink = StringSink::new(&mut text);
    let (leader, follower) = tokio::join!(cache.get("k", &mut byte_sink), cache.get("k", &mut text_sink));

    leader.unwrap();
    assert!(matches!(follower, Err(Error::Sink(_))));
    assert_eq!(bytes, [0xff, 0xfe]);
    assert!(text.is_empty());
    assert_eq!(cache.stats().source_attempt, 1);
}

#[tokio::test]
async fn leader_sink_errors_do_not_fail_followers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<Profile>(Clock::new_frozen())
        .store(LruStore::builder(8, Clock::new_frozen()).objects())
        .getter(profile_getter(&calls))
        .build()
        .unwrap();

    let mut bytes = Vec::new();
    let mut profile = Profile::default();
    let mut byte_sink = ByteSink::new(&mut bytes);
    let mut object_sink = ObjectSink::new(&mut profile);
    let (leader, follower) = tokio::join!(cache.get("dave", &mut byte_sink), cache.get("dave", &mut object_sink));

    assert!(matches!(leader, Err(Error::Sink(_))));
    follower.unwrap();
    assert!(bytes.is_empty());
    assert_eq!(profile.name, "dave");

    let stats = cache.stats();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!((stats.source_hit, stats.source_err), (1, 0));
    assert_eq!(cache.store().len(), Some(1));
}

#[tokio::test]
async fn abandoned_leader_does_not_restart_the_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(byte_store(Clock::new_frozen()))
        .getter(text_getter(&calls))
        .build()
        .unwrap();

    let (abandoned, follower) = tokio::join!(
        tokio::time::timeout(LOAD_DELAY / 4, get_string(&cache, "k")),
        get_string(&cache, "k"),
    );

    assert!(abandoned.is_err());
    assert_eq!(follower.unwrap(), "value of k");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!((stats.source_attempt, stats.source_hit), (1, 1));
    assert!(cache.store().get("k").unwrap().is_some());
}

struct Silent;

impl Getter<()> for Silent {
    async fn get(&self, _key: &str, _sink: &mut dyn Sink<()>) -> Result<(), SourceError> {
        Ok(())
    }
}

#[tokio::test]
async fn getter_that_stores_nothing_fails_the_load() {
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(byte_store(Clock::new_frozen()))
        .getter(Silent)
        .build()
        .unwrap();

    let error = get_string(&cache, "k").await.unwrap_err();
    assert!(error.source_error().is_some(), "{error}");
    assert_eq!(cache.stats().source_err, 1);
    assert_eq!(cache.store().len(), Some(0));
}

#[tokio::test]
async fn populate_failure_still_delivers_the_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<Profile>(Clock::new_frozen())
        .store(LruStore::builder(8, Clock::new_frozen()).bytes())
        .getter(profile_getter(&calls))
        .build()
        .unwrap();

    let mut profile = Profile::default();
    cache.get("carol", &mut ObjectSink::new(&mut profile)).await.unwrap();
    assert_eq!(profile.name, "carol");

    // Byte-only stores refuse objects, so the next call loads again.
    cache.get("carol", &mut ObjectSink::new(&mut profile)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = cache.stats();
    assert_eq!(stats.err, 2);
    assert_eq!(stats.source_hit, 2);
    assert_eq!(cache.store().len(), Some(0));
}

#[tokio::test]
async fn ttl_set_by_the_getter_expires_the_entry() {
    let control = ClockControl::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = ReadThroughCache::builder::<()>(control.to_clock())
        .store(byte_store(control.to_clock()))
        .getter(getter_fn(move |key: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, SourceError>(View::<()>::with_ttl_secs(Value::text(key), 1)) }
        }))
        .build()
        .unwrap();

    get_string(&cache, "k").await.unwrap();
    let stored = cache.store().get("k").unwrap().unwrap();
    assert_eq!(stored.ttl(), Some(Duration::from_secs(1)));

    get_string(&cache, "k").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    control.advance(Duration::from_millis(1500));
    get_string(&cache, "k").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A store whose first lookup misses but quietly stores a value, as if another load for the
/// key had just finished.
struct LateFill {
    inner: MockStore<()>,
    lookups: AtomicUsize,
}

impl CacheStore<()> for LateFill {
    fn get(&self, key: &str) -> Result<Option<View<()>>, StoreError> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.set(key, Value::text("filled elsewhere"), None)?;
            return Ok(None);
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value<()>, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
}

#[tokio::test]
async fn leader_recheck_hit_skips_the_source() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ReadThroughCache::builder::<()>(Clock::new_frozen())
        .store(LateFill {
            inner: MockStore::new(),
            lookups: AtomicUsize::new(0),
        })
        .getter(text_getter(&calls))
        .build()
        .unwrap();

    assert_eq!(get_string(&cache, "k").await.unwrap(), "filled elsewhere");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let stats = cache.stats();
    assert_eq!((stats.miss, stats.hit, stats.source_attempt), (1, 1, 0));
}
