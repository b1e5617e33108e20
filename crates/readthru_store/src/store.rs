// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.

use std::{sync::Arc, time::Duration};

use crate::{StoreError, Value, View};

/// Trait for cache store implementations.
///
/// A store is a synchronous, non-blocking key/value map. Every operation must be O(1)
/// expected and must never wait on I/O, since the read-through cache calls into it on the
/// hot path of every request.
///
/// A key that is absent, or present but expired, is reported as `Ok(None)` by [`get`](Self::get).
/// An `Err` means the backend itself failed; callers treat that as a soft failure.
///
/// Only `len` and `is_empty` have default implementations:
/// - `len`: Returns `None` (not all stores track size)
/// - `is_empty`: Delegates to `len`
pub trait CacheStore<T>: Send + Sync {
    /// Looks up a live entry, refreshing its recency.
    ///
    /// The returned view carries the time-to-live the entry was stored with.
    fn get(&self, key: &str) -> Result<Option<View<T>>, StoreError>;

    /// Inserts or replaces a value. A `None` or zero `ttl` means the entry never expires.
    fn set(&self, key: &str, value: Value<T>, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes a value. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Returns the number of resident entries, if supported.
    ///
    /// Expired entries that have not been read since they expired may still be counted.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the store holds no entries.
    ///
    /// Returns `None` for implementations that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}

impl<T, S> CacheStore<T> for Arc<S>
where
    S: CacheStore<T> + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<View<T>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value<T>, ttl: Option<Duration>) -> Result<(), StoreError> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn len(&self) -> Option<u64> {
        (**self).len()
    }
}
