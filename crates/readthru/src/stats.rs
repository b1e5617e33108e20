// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-lifetime counters for a read-through cache.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// A point-in-time copy of a cache's counters.
///
/// Each field is read independently; a snapshot taken while calls are in progress is not
/// guaranteed to be consistent across fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Calls to `get`.
    pub get: u64,
    /// Values served from the store.
    pub hit: u64,
    /// Callers that fell through to a load.
    pub miss: u64,
    /// Store failures, including soft lookup errors and failed populates.
    pub err: u64,
    /// Calls to `delete`.
    pub del: u64,
    /// Loads admitted by the rate limiter and handed to the getter.
    pub source_attempt: u64,
    /// Getter calls that produced a value.
    pub source_hit: u64,
    /// Getter calls that failed.
    pub source_err: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Stats {
    get: AtomicU64,
    hit: AtomicU64,
    miss: AtomicU64,
    err: AtomicU64,
    del: AtomicU64,
    source_attempt: AtomicU64,
    source_hit: AtomicU64,
    source_err: AtomicU64,
}

macro_rules! counters {
    ($($name:ident => $field:ident),* $(,)?) => {
        impl Stats {
            $(
                pub(crate) fn $name(&self) {
                    self.$field.fetch_add(1, Relaxed);
                }
            )*

            pub(crate) fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Relaxed),)*
                }
            }
        }
    };
}

counters! {
    record_get => get,
    record_hit => hit,
    record_miss => miss,
    record_err => err,
    record_del => del,
    record_source_attempt => source_attempt,
    record_source_hit => source_hit,
    record_source_err => source_err,
}
