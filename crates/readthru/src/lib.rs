// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A read-through cache with stampede protection and source rate limiting.
//!
//! [`ReadThroughCache`] sits between callers and a slow data source. A lookup that hits the
//! store is answered directly; a miss is loaded from the source by a [`Getter`], stored, and
//! delivered. While a load for a key is in flight, further callers for that key wait for it
//! instead of calling the source again.
//!
//! The moving parts:
//!
//! - a [`CacheStore`] holds values; [`LruStore`] is bounded, least-recently-used and
//!   expires entries lazily by time-to-live,
//! - a [`FlightGroup`] coalesces concurrent loads of a key ([`CoalescingGroup`] by default),
//! - an optional [`RateLimiter`] caps how fast loads may reach the source,
//! - [`Sink`]s copy values into caller-owned variables ([`StringSink`], [`ByteSink`],
//!   [`ObjectSink`]), so a caller never holds a mutable alias of a cached value.
//!
//! Counters are available through [`ReadThroughCache::stats`], and every cache operation emits
//! a `tracing` event carrying the cache name.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use readthru::{ByteSink, Error, LruStore, ReadThroughCache, SourceError, Value, View, getter_fn};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let clock = Clock::new_frozen();
//! let cache = ReadThroughCache::builder::<()>(clock.clone())
//!     .store(LruStore::builder(1_000, clock).bytes())
//!     .getter(getter_fn(|key: String| async move {
//!         if key == "k" {
//!             return Err(SourceError::from_message("not configured"));
//!         }
//!         Ok(View::<()>::with_ttl(Value::bytes(key.into_bytes()), Duration::from_secs(60)))
//!     }))
//!     .rate_limit(100)
//!     .build()?;
//!
//! let mut buf = Vec::new();
//! cache.get("user:1", &mut ByteSink::new(&mut buf)).await?;
//! assert_eq!(buf, b"user:1");
//!
//! let error = cache.get("k", &mut ByteSink::new(&mut buf)).await.unwrap_err();
//! assert!(matches!(error, Error::Source(_)));
//! # Ok::<(), Error>(())
//! # });
//! ```

mod builder;
mod cache;
mod error;
mod getter;
mod limiter;
mod sink;
mod stats;
mod telemetry;

#[doc(inline)]
pub use builder::ReadThroughCacheBuilder;
#[doc(inline)]
pub use cache::{LoadResult, ReadThroughCache};
#[doc(inline)]
pub use error::{Error, Result, SinkError, SourceError};
#[doc(inline)]
pub use getter::{Getter, GetterFn, getter_fn};
#[doc(inline)]
pub use limiter::RateLimiter;
#[doc(inline)]
pub use readthru_flight::{CoalescingGroup, FlightGroup};
#[doc(inline)]
pub use readthru_store::{CacheStore, EvictionListener, LruStore, LruStoreBuilder, RemovalCause, Shape, StoreError, Value, View};
#[doc(inline)]
pub use sink::{ByteSink, ObjectSink, Sink, StringSink};
#[doc(inline)]
pub use stats::StatsSnapshot;
#[doc(inline)]
pub use telemetry::CacheName;
