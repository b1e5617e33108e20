// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`ReadThroughCache`].
//!
//! The store and the getter are required. Until both have been supplied the builder has no
//! `build` method, so a cache missing either one does not compile.

use std::{marker::PhantomData, sync::Arc};

use readthru_flight::{CoalescingGroup, FlightGroup};
use readthru_store::CacheStore;
use tick::Clock;

use crate::{
    Error, Getter, RateLimiter, ReadThroughCache, Result,
    cache::{Core, LoadResult},
    stats::Stats,
    telemetry::{CacheName, CacheTelemetry},
};

const DEFAULT_NAME: CacheName = "readthru";

/// Builder for constructing a [`ReadThroughCache`].
///
/// Created by calling [`ReadThroughCache::builder`].
///
/// # Examples
///
/// ```
/// use readthru::{LruStore, ReadThroughCache, SourceError, Value, View, getter_fn};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let cache = ReadThroughCache::builder::<()>(clock.clone())
///     .store(LruStore::builder(100, clock).bytes())
///     .getter(getter_fn(|key: String| async move { Ok::<_, SourceError>(View::new(Value::text(key))) }))
///     .rate_limit(50)
///     .name("profiles")
///     .build()?;
///
/// assert_eq!(cache.name(), "profiles");
/// # Ok::<(), readthru::Error>(())
/// ```
#[derive(Debug)]
pub struct ReadThroughCacheBuilder<T, S = (), G = (), F = CoalescingGroup<LoadResult<T>>> {
    name: CacheName,
    store: S,
    getter: G,
    flights: F,
    rate_limit: Option<u32>,
    clock: Clock,
    _value: PhantomData<fn() -> T>,
}

impl<T> ReadThroughCacheBuilder<T> {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            name: DEFAULT_NAME,
            store: (),
            getter: (),
            flights: CoalescingGroup::new(),
            rate_limit: None,
            clock,
            _value: PhantomData,
        }
    }
}

impl<T, G, F> ReadThroughCacheBuilder<T, (), G, F> {
    /// Sets the store that holds cached values.
    ///
    /// Use [`LruStore`](readthru_store::LruStore) for a bounded in-memory store, or supply any
    /// other [`CacheStore`].
    pub fn store<S>(self, store: S) -> ReadThroughCacheBuilder<T, S, G, F>
    where
        S: CacheStore<T>,
    {
        ReadThroughCacheBuilder {
            name: self.name,
            store,
            getter: self.getter,
            flights: self.flights,
            rate_limit: self.rate_limit,
            clock: self.clock,
            _value: PhantomData,
        }
    }
}

impl<T, S, F> ReadThroughCacheBuilder<T, S, (), F> {
    /// Sets the source that missing values are loaded from.
    pub fn getter<G>(self, getter: G) -> ReadThroughCacheBuilder<T, S, G, F>
    where
        G: Getter<T>,
    {
        ReadThroughCacheBuilder {
            name: self.name,
            store: self.store,
            getter,
            flights: self.flights,
            rate_limit: self.rate_limit,
            clock: self.clock,
            _value: PhantomData,
        }
    }
}

impl<T, S, G, F> ReadThroughCacheBuilder<T, S, G, F> {
    /// Replaces the default [`CoalescingGroup`] with another [`FlightGroup`].
    ///
    /// Pass an `Arc` to share one group between caches; loads of equal keys in those caches
    /// are then coalesced together.
    pub fn flight_group<F2>(self, flights: F2) -> ReadThroughCacheBuilder<T, S, G, F2>
    where
        F2: FlightGroup<LoadResult<T>>,
    {
        ReadThroughCacheBuilder {
            name: self.name,
            store: self.store,
            getter: self.getter,
            flights,
            rate_limit: self.rate_limit,
            clock: self.clock,
            _value: PhantomData,
        }
    }

    /// Limits source loads to `per_second` per second, with bursts of up to `per_second`.
    ///
    /// Without a limit every miss is allowed to reach the source.
    #[must_use]
    pub fn rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limit = Some(per_second);
        self
    }

    /// Sets the name that identifies this cache in log events.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }
}

impl<T, S, G, F> ReadThroughCacheBuilder<T, S, G, F>
where
    S: CacheStore<T>,
    G: Getter<T>,
    F: FlightGroup<LoadResult<T>>,
{
    /// Builds the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the rate limit is zero.
    pub fn build(self) -> Result<ReadThroughCache<T, S, G, F>> {
        let limiter = match self.rate_limit {
            None => None,
            Some(0) => return Err(Error::InvalidArgument("rate limit must be greater than 0")),
            Some(per_second) => Some(RateLimiter::new(per_second, per_second, self.clock)),
        };

        Ok(ReadThroughCache {
            core: Arc::new(Core {
                telemetry: CacheTelemetry::new(self.name),
                store: self.store,
                getter: self.getter,
                limiter,
                stats: Stats::default(),
                _value: PhantomData,
            }),
            flights: self.flights,
        })
    }
}
