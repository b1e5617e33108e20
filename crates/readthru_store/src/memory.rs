// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded in-memory store with least-recently-used eviction.
//!
//! [`LruStore`] keeps at most `capacity` entries. Inserting a new key into a full store evicts
//! the least recently used entry first; reading a key or overwriting it makes it the most
//! recently used. Entries may carry a time-to-live which is checked lazily on read.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use hashbrown::HashMap;
use parking_lot::Mutex;
use tick::Clock;

use crate::{
    CacheStore, Shape, StoreError, Value, View,
    lru::{LruList, NodeIndex},
    value::normalize_ttl,
};

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RemovalCause {
    /// Evicted to make room for a new key.
    Capacity,
    /// Removed by [`CacheStore::delete`].
    Explicit,
    /// Found expired on read.
    Expired,
}

impl RemovalCause {
    /// Returns a short lowercase name for this cause.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Explicit => "explicit",
            Self::Expired => "expired",
        }
    }
}

/// Callback invoked with the key, value and cause of every entry that leaves an [`LruStore`].
///
/// The listener runs on the thread that triggered the removal, after the store's internal
/// lock has been released. It may therefore call back into the store.
pub type EvictionListener<T> = Arc<dyn Fn(&str, &Value<T>, RemovalCause) + Send + Sync>;

struct Slot<T> {
    value: Value<T>,
    ttl: Option<Duration>,
    expire_at: Option<Instant>,
    node: NodeIndex,
}

impl<T> Slot<T> {
    fn view(&self) -> View<T> {
        View::from_parts(self.value.clone(), self.ttl)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|expire_at| now >= expire_at)
    }
}

struct State<T> {
    entries: HashMap<String, Slot<T>>,
    order: LruList<String>,
}

struct Removed<T> {
    key: String,
    value: Value<T>,
    cause: RemovalCause,
}

struct Inner<T> {
    name: Option<String>,
    byte_only: bool,
    clock: Clock,
    listener: Option<EvictionListener<T>>,
    state: Mutex<State<T>>,
}

/// A bounded, thread-safe key/value store with LRU eviction and lazy TTL expiry.
///
/// Two variants exist, chosen by the builder:
///
/// - [`bytes`](LruStoreBuilder::bytes): a byte-only store. Text values are stored as bytes and
///   object values are rejected with a [`StoreError`].
/// - [`objects`](LruStoreBuilder::objects): an object-capable store that keeps any value as is.
///
/// Cloning an `LruStore` is cheap and yields a handle to the same underlying store.
///
/// # Examples
///
/// ```
/// use readthru_store::{CacheStore, LruStore, Value};
/// use tick::Clock;
///
/// let store = LruStore::builder(2, Clock::new_frozen()).objects();
///
/// store.set("a", Value::object(1_u32), None)?;
/// store.set("b", Value::object(2_u32), None)?;
/// store.get("a")?; // `a` is now the most recently used
/// store.set("c", Value::object(3_u32), None)?;
///
/// assert!(store.get("b")?.is_none());
/// assert!(store.get("a")?.is_some());
/// # Ok::<(), readthru_store::StoreError>(())
/// ```
pub struct LruStore<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for LruStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for LruStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LruStore")
            .field("name", &self.inner.name)
            .field("byte_only", &self.inner.byte_only)
            .field("len", &state.order.len())
            .field("capacity", &state.order.capacity())
            .finish_non_exhaustive()
    }
}

impl<T> LruStore<T> {
    /// Starts building a store that holds at most `capacity` entries and reads time from `clock`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn builder(capacity: usize, clock: Clock) -> LruStoreBuilder<T> {
        assert!(capacity > 0, "capacity must be greater than 0");
        LruStoreBuilder {
            capacity,
            clock,
            name: None,
            listener: None,
        }
    }

    /// Returns the name given to the store, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the maximum number of entries the store holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.state.lock().order.capacity()
    }

    /// Returns `true` if this store only accepts byte and text values.
    #[must_use]
    pub fn is_byte_only(&self) -> bool {
        self.inner.byte_only
    }

    fn admit(&self, value: Value<T>) -> Result<Value<T>, StoreError> {
        if !self.inner.byte_only {
            return Ok(value);
        }

        match value {
            Value::Bytes(_) => Ok(value),
            Value::Text(text) => Ok(Value::Bytes(bytes::Bytes::copy_from_slice(text.as_bytes()))),
            Value::Object(_) => Err(StoreError::type_mismatch(Shape::Object)),
        }
    }

    fn notify(&self, removed: Vec<Removed<T>>) {
        for Removed { key, value, cause } in removed {
            tracing::debug!(
                cache.name = self.inner.name.as_deref().unwrap_or_default(),
                cache.removal_cause = cause.as_str(),
                "entry removed"
            );

            if let Some(listener) = &self.inner.listener {
                listener(&key, &value, cause);
            }
        }
    }
}

impl<T: Send + Sync> CacheStore<T> for LruStore<T> {
    fn get(&self, key: &str) -> Result<Option<View<T>>, StoreError> {
        let now = self.inner.clock.instant();

        let expired = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let Some(slot) = state.entries.get(key) else {
                return Ok(None);
            };

            if !slot.is_expired(now) {
                state.order.touch(slot.node);
                return Ok(Some(slot.view()));
            }

            let Some((key, slot)) = state.entries.remove_entry(key) else {
                return Ok(None);
            };
            state.order.remove(slot.node);
            Removed {
                key,
                value: slot.value,
                cause: RemovalCause::Expired,
            }
        };

        self.notify(vec![expired]);
        Ok(None)
    }

    fn set(&self, key: &str, value: Value<T>, ttl: Option<Duration>) -> Result<(), StoreError> {
        let value = self.admit(value)?;
        let ttl = normalize_ttl(ttl);
        let expire_at = ttl.and_then(|ttl| self.inner.clock.instant().checked_add(ttl));

        let evicted = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            if let Some(slot) = state.entries.get_mut(key) {
                slot.value = value;
                slot.ttl = ttl;
                slot.expire_at = expire_at;
                state.order.touch(slot.node);
                return Ok(());
            }

            let mut evicted = Vec::new();
            while state.order.is_full() {
                let Some(victim) = state.order.pop_back() else {
                    break;
                };
                if let Some(slot) = state.entries.remove(&victim) {
                    evicted.push(Removed {
                        key: victim,
                        value: slot.value,
                        cause: RemovalCause::Capacity,
                    });
                }
            }

            let node = state
                .order
                .push_front(key.to_owned())
                .ok_or_else(|| StoreError::from_message("recency list has no free slot"))?;
            state.entries.insert(
                key.to_owned(),
                Slot {
                    value,
                    ttl,
                    expire_at,
                    node,
                },
            );
            evicted
        };

        self.notify(evicted);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let removed = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let Some((key, slot)) = state.entries.remove_entry(key) else {
                return Ok(());
            };
            state.order.remove(slot.node);
            Removed {
                key,
                value: slot.value,
                cause: RemovalCause::Explicit,
            }
        };

        self.notify(vec![removed]);
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.state.lock().entries.len() as u64)
    }
}

/// Builder for [`LruStore`]. Created by [`LruStore::builder`].
pub struct LruStoreBuilder<T> {
    capacity: usize,
    clock: Clock,
    name: Option<String>,
    listener: Option<EvictionListener<T>>,
}

impl<T> fmt::Debug for LruStoreBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStoreBuilder")
            .field("capacity", &self.capacity)
            .field("name", &self.name)
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> LruStoreBuilder<T> {
    /// Sets a name used in log events emitted by the store.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Registers a listener that is told about every entry leaving the store.
    ///
    /// Overwriting an existing key is not a removal and does not notify the listener.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    ///
    /// use readthru_store::{CacheStore, LruStore, RemovalCause, Value};
    /// use tick::Clock;
    ///
    /// let removed = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&removed);
    ///
    /// let store = LruStore::<()>::builder(1, Clock::new_frozen())
    ///     .on_evict(move |key: &str, _value: &Value<()>, cause| {
    ///         sink.lock().unwrap().push((key.to_owned(), cause));
    ///     })
    ///     .bytes();
    ///
    /// store.set("a", Value::text("1"), None)?;
    /// store.set("b", Value::text("2"), None)?;
    ///
    /// assert_eq!(*removed.lock().unwrap(), vec![("a".to_owned(), RemovalCause::Capacity)]);
    /// # Ok::<(), readthru_store::StoreError>(())
    /// ```
    #[must_use]
    pub fn on_evict<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, &Value<T>, RemovalCause) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Builds a byte-only store.
    ///
    /// Text is converted to bytes on the way in and object values are rejected.
    #[must_use]
    pub fn bytes(self) -> LruStore<T> {
        self.build(true)
    }

    /// Builds a store that accepts bytes, text and objects unchanged.
    #[must_use]
    pub fn objects(self) -> LruStore<T> {
        self.build(false)
    }

    fn build(self, byte_only: bool) -> LruStore<T> {
        LruStore {
            inner: Arc::new(Inner {
                name: self.name,
                byte_only,
                clock: self.clock,
                listener: self.listener,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    order: LruList::new(self.capacity),
                }),
            }),
        }
    }
}
