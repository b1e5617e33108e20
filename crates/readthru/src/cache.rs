// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The read-through cache.

use std::{fmt, marker::PhantomData, sync::Arc};

use readthru_flight::{CoalescingGroup, FlightGroup};
use readthru_store::{CacheStore, View};
use tick::Clock;

use crate::{
    Error, Getter, RateLimiter, Result, Sink, SourceError,
    builder::ReadThroughCacheBuilder,
    sink::ViewSink,
    stats::{Stats, StatsSnapshot},
    telemetry::{CacheActivity, CacheName, CacheOperation, CacheTelemetry},
};

/// The result a coalesced load publishes to every caller waiting on it.
pub type LoadResult<T> = std::result::Result<View<T>, Error>;

/// A cache that loads missing values from a source on demand.
///
/// A lookup that misses the store is routed through a [`FlightGroup`], so concurrent callers
/// asking for the same key share a single call to the [`Getter`]. The load fills a private
/// staging sink; once it finishes, every caller of the burst, the one that started it
/// included, receives a copy of the published [`View`] in its own sink. A caller that stops
/// waiting does not cancel the load for the others.
///
/// Loads are admitted by an optional [`RateLimiter`] shared by all keys. When no token is
/// available the load fails with [`Error::Backpressure`] without calling the getter.
///
/// Store failures during lookup are soft: they are counted and the call continues as a miss.
///
/// # Examples
///
/// ```
/// use readthru::{LruStore, ReadThroughCache, SourceError, StringSink, Value, View, getter_fn};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let clock = Clock::new_frozen();
/// let cache = ReadThroughCache::builder::<()>(clock.clone())
///     .store(LruStore::builder(1024, clock).bytes())
///     .getter(getter_fn(|key: String| async move {
///         Ok::<_, SourceError>(View::new(Value::text(format!("value of {key}"))))
///     }))
///     .build()?;
///
/// let mut value = String::new();
/// cache.get("answer", &mut StringSink::new(&mut value)).await?;
/// assert_eq!(value, "value of answer");
/// assert_eq!(cache.stats().source_hit, 1);
/// # Ok::<(), readthru::Error>(())
/// # });
/// ```
pub struct ReadThroughCache<T, S, G, F = CoalescingGroup<LoadResult<T>>> {
    pub(crate) core: Arc<Core<T, S, G>>,
    pub(crate) flights: F,
}

/// The parts of a cache a load needs. Shared with in-flight loads, which may outlive the
/// caller that started them.
pub(crate) struct Core<T, S, G> {
    pub(crate) telemetry: CacheTelemetry,
    pub(crate) store: S,
    pub(crate) getter: G,
    pub(crate) limiter: Option<RateLimiter>,
    pub(crate) stats: Stats,
    pub(crate) _value: PhantomData<fn() -> T>,
}

impl ReadThroughCache<(), (), (), ()> {
    /// Creates a new cache builder.
    ///
    /// The clock drives the rate limiter; give the store the same clock so that time-to-live
    /// and rate limiting advance together in tests.
    #[must_use]
    pub fn builder<T>(clock: Clock) -> ReadThroughCacheBuilder<T> {
        ReadThroughCacheBuilder::new(clock)
    }
}

impl<T, S, G, F> ReadThroughCache<T, S, G, F> {
    /// Returns the name used in this cache's log events.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.core.telemetry.name()
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.core.store
    }

    /// Returns a point-in-time copy of the cache's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }
}

impl<T, S, G, F> ReadThroughCache<T, S, G, F>
where
    T: Clone + Send + Sync + 'static,
    S: CacheStore<T> + 'static,
    G: Getter<T> + 'static,
    F: FlightGroup<LoadResult<T>>,
{
    /// Delivers the value for `key` into `dest`, loading it from the source on a miss.
    ///
    /// # Errors
    ///
    /// - [`Error::Backpressure`] if the load was refused by the rate limiter.
    /// - [`Error::Source`] if the getter failed.
    /// - [`Error::Sink`] if `dest` cannot hold the value's shape.
    ///
    /// The first two are shared by every caller of the same load; a sink error affects only the
    /// caller whose sink rejected the value.
    pub async fn get(&self, key: &str, dest: &mut dyn Sink<T>) -> Result<()> {
        let core = &self.core;
        core.stats.record_get();

        match core.store.get(key) {
            Ok(Some(view)) => {
                core.stats.record_hit();
                core.telemetry.record(CacheOperation::Get, CacheActivity::Hit);
                return Ok(dest.set_view(&view)?);
            }
            Ok(None) => {}
            Err(error) => {
                core.stats.record_err();
                core.telemetry
                    .record_error(CacheOperation::Get, CacheActivity::BackendError, &error);
            }
        }

        core.stats.record_miss();
        core.telemetry.record(CacheOperation::Get, CacheActivity::Miss);

        let mut led = false;
        let result = self
            .flights
            .work(key, || {
                led = true;
                Arc::clone(core).load(key.to_owned())
            })
            .await;

        let view = result?;
        if !led {
            core.telemetry.record(CacheOperation::Get, CacheActivity::Coalesced);
        }
        Ok(dest.set_view(&view)?)
    }

    /// Removes `key` from the store.
    ///
    /// A load for `key` that is already in flight is not interrupted and may store its value
    /// after this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store failed to remove the entry.
    pub fn delete(&self, key: &str) -> Result<()> {
        let core = &self.core;
        core.stats.record_del();
        match core.store.delete(key) {
            Ok(()) => {
                core.telemetry.record(CacheOperation::Delete, CacheActivity::Deleted);
                Ok(())
            }
            Err(error) => {
                core.stats.record_err();
                core.telemetry
                    .record_error(CacheOperation::Delete, CacheActivity::BackendError, &error);
                Err(Error::Store(error))
            }
        }
    }
}

impl<T, S, G> Core<T, S, G>
where
    T: Clone + Send + Sync + 'static,
    S: CacheStore<T>,
    G: Getter<T>,
{
    /// Runs one load on behalf of every caller waiting on `key`.
    async fn load(self: Arc<Self>, key: String) -> LoadResult<T> {
        // A load for this key that finished after our lookup may have stored it already.
        match self.store.get(&key) {
            Ok(Some(view)) => {
                self.stats.record_hit();
                self.telemetry.record(CacheOperation::Load, CacheActivity::Hit);
                return Ok(view);
            }
            Ok(None) => {}
            Err(error) => {
                self.stats.record_err();
                self.telemetry
                    .record_error(CacheOperation::Load, CacheActivity::BackendError, &error);
            }
        }

        if self.limiter.as_ref().is_some_and(|limiter| !limiter.try_take()) {
            self.telemetry.record(CacheOperation::Load, CacheActivity::Backpressure);
            return Err(Error::Backpressure);
        }

        self.stats.record_source_attempt();
        let mut staging = ViewSink::new();
        let loaded = match self.getter.get(&key, &mut staging).await {
            Ok(()) => staging
                .into_view()
                .ok_or_else(|| SourceError::from_message("getter returned without storing a value")),
            Err(error) => Err(error),
        };
        let view = match loaded {
            Ok(view) => view,
            Err(error) => {
                self.stats.record_source_err();
                self.telemetry
                    .record_error(CacheOperation::Load, CacheActivity::SourceError, &error);
                return Err(Error::Source(error));
            }
        };

        self.stats.record_source_hit();
        self.telemetry.record(CacheOperation::Load, CacheActivity::SourceHit);

        if let Err(error) = self.store.set(&key, view.value().clone(), view.ttl()) {
            self.stats.record_err();
            self.telemetry
                .record_error(CacheOperation::Load, CacheActivity::PopulateError, &error);
        }

        Ok(view)
    }
}

impl<T, S, G, F> fmt::Debug for ReadThroughCache<T, S, G, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("name", &self.core.telemetry.name())
            .field("limiter", &self.core.limiter)
            .field("stats", &self.core.stats.snapshot())
            .finish_non_exhaustive()
    }
}
