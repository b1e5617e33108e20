// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Coalesces concurrent loads of the same key into a single execution.
//!
//! This crate provides the [`FlightGroup`] trait and its default implementation,
//! [`CoalescingGroup`]. When several tasks ask for the same key while a load for that key is
//! in flight, only one of them (the "leader") runs its closure; the others (the "followers")
//! wait and receive a clone of the leader's result.
//!
//! The group owns each burst's loader. Whichever caller is awaiting drives it, so the load does
//! not depend on the caller that started it staying around.
//!
//! # Example
//!
//! ```
//! use readthru_flight::{CoalescingGroup, FlightGroup};
//!
//! # async fn example() {
//! let group = CoalescingGroup::<String>::new();
//!
//! let result = group
//!     .work("user:123", || async {
//!         // Runs once per burst, however many callers arrive concurrently.
//!         "expensive_result".to_string()
//!     })
//!     .await;
//! # }
//! ```
//!
//! # Registration
//!
//! A caller joins a burst when it *calls* [`work`](FlightGroup::work), not when it first polls
//! the returned future. Futures created back to back for the same key therefore share one
//! execution even if none of them has been polled yet.
//!
//! # Cancellation and Panic Safety
//!
//! - Once started, a burst's loader runs to completion as long as any caller is still waiting
//!   on it. Dropping the leader's future does not cancel the load; the remaining followers keep
//!   driving it and receive its result.
//! - If every caller waiting on a key goes away, the load is dropped and the key is forgotten.
//!   The next caller starts a fresh load.
//! - If the loader panics, the panic reaches every caller of the burst and the key is
//!   forgotten.
//!
//! In every case the loader runs at most once per burst.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

/// Collapses concurrent duplicate work into a single execution per key.
///
/// Implementations guarantee that, for a given key, `func` runs at most once per burst and that
/// every caller of the same burst observes the same result.
pub trait FlightGroup<T>: Send + Sync {
    /// Runs `func` for `key` unless a run for `key` is already in flight, in which case the
    /// returned future resolves to that run's result instead.
    ///
    /// The future built by `func` is owned by the group, so it may outlive the caller that
    /// created it.
    fn work<F, Fut>(&self, key: &str, func: F) -> impl Future<Output = T> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send + 'static;
}

impl<T, G> FlightGroup<T> for Arc<G>
where
    G: FlightGroup<T> + ?Sized,
{
    fn work<F, Fut>(&self, key: &str, func: F) -> impl Future<Output = T> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send + 'static,
    {
        (**self).work(key, func)
    }
}

/// The message of a panic raised by a burst's loader.
#[derive(Clone)]
struct Panicked(Arc<str>);

impl Panicked {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| Arc::from(*message))
            .or_else(|| payload.downcast_ref::<String>().map(|message| Arc::from(message.as_str())))
            .unwrap_or_else(|| Arc::from("loader panicked"));
        Self(message)
    }
}

/// A burst's loader, polled by whichever of its callers is currently awaiting it.
type Load<T> = Shared<BoxFuture<'static, Result<T, Panicked>>>;

struct Entry<T> {
    load: Load<T>,
    waiters: usize,
}

type Registry<T> = Arc<Mutex<HashMap<String, Entry<T>>>>;

/// The default [`FlightGroup`]: a registry of in-flight calls keyed by string.
///
/// A `CoalescingGroup` is an ordinary value. Every read-through cache gets its own unless one
/// is explicitly shared, so unrelated caches never coalesce with each other.
///
/// `func` is invoked while the registry is locked. It should only build its future and must
/// not call back into the same group.
pub struct CoalescingGroup<T> {
    calls: Registry<T>,
}

impl<T> Default for CoalescingGroup<T> {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
        }
    }
}

impl<T> fmt::Debug for CoalescingGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoalescingGroup")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

impl<T> CoalescingGroup<T> {
    /// Creates an empty group.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a load for `key` is in flight.
    #[must_use]
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.calls.lock().contains_key(key)
    }

    /// Returns the number of callers currently attached to the load for `key`.
    #[must_use]
    pub fn waiters(&self, key: &str) -> usize {
        self.calls.lock().get(key).map_or(0, |entry| entry.waiters)
    }
}

impl<T> CoalescingGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn join<F, Fut>(&self, key: &str, func: F) -> Registration<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut calls = self.calls.lock();
        let load = match calls.get_mut(key) {
            Some(entry) => {
                entry.waiters += 1;
                entry.load.clone()
            }
            None => {
                let load = AssertUnwindSafe(func())
                    .catch_unwind()
                    .map(|outcome| outcome.map_err(|payload| Panicked::from_payload(&*payload)))
                    .boxed()
                    .shared();
                calls.insert(
                    key.to_owned(),
                    Entry {
                        load: load.clone(),
                        waiters: 1,
                    },
                );
                load
            }
        };

        Registration {
            key: key.to_owned(),
            load,
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> FlightGroup<T> for CoalescingGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn work<F, Fut>(&self, key: &str, func: F) -> impl Future<Output = T> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send + 'static,
    {
        let registration = self.join(key, func);
        async move {
            let outcome = registration.load.clone().await;
            registration.retire();
            match outcome {
                Ok(value) => value,
                Err(Panicked(message)) => panic::resume_unwind(Box::new(message.to_string())),
            }
        }
    }
}

/// One caller's membership in a burst.
///
/// `load` is never polled through this handle, so it keeps identifying the burst after the
/// load completes.
struct Registration<T> {
    key: String,
    load: Load<T>,
    calls: Registry<T>,
}

impl<T> Registration<T> {
    fn owns(&self, entry: &Entry<T>) -> bool {
        entry.load.ptr_eq(&self.load)
    }

    /// Removes the burst from the registry once its loader has produced a value.
    ///
    /// Callers arriving after this point start a new burst.
    fn retire(&self) {
        let mut calls = self.calls.lock();
        if calls.get(&self.key).is_some_and(|entry| self.owns(entry)) {
            calls.remove(&self.key);
        }
    }
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        let mut calls = self.calls.lock();
        let Some(entry) = calls.get_mut(&self.key) else {
            return;
        };
        if !self.owns(entry) {
            return;
        }

        entry.waiters -= 1;
        if entry.waiters == 0 {
            calls.remove(&self.key);
        }
    }
}
