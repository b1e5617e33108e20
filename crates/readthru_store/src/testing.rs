// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! This module provides `MockStore`, an unbounded store that records every operation and
//! supports failure injection for exercising the soft-error paths of a read-through cache.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{CacheStore, Shape, StoreError, Value, View};

/// Recorded store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A get was performed with the given key.
    Get(String),
    /// A set was performed.
    Set {
        /// The key that was written.
        key: String,
        /// The shape of the value that was written.
        shape: Shape,
        /// The requested time-to-live.
        ttl: Option<Duration>,
    },
    /// A delete was performed with the given key.
    Delete(String),
}

impl StoreOp {
    /// Returns the key the operation targeted.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Get(key) | Self::Delete(key) | Self::Set { key, .. } => key,
        }
    }
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

/// A configurable mock store for testing.
///
/// Values are kept in an unbounded map and never expire; the requested TTL is recorded and
/// handed back on reads.
///
/// Operations can be made to fail on demand, and every operation (failed or not) is recorded
/// for later verification.
///
/// # Examples
///
/// ```
/// use readthru_store::{CacheStore, Value, testing::{MockStore, StoreOp}};
///
/// let store = MockStore::<()>::new();
/// store.set("key", Value::text("v"), None)?;
/// assert!(store.get("key")?.is_some());
///
/// store.fail_when(|op| matches!(op, StoreOp::Get(k) if k == "forbidden"));
/// assert!(store.get("forbidden").is_err());
/// assert!(store.get("allowed").is_ok());
/// assert_eq!(store.operations().len(), 4);
/// # Ok::<(), readthru_store::StoreError>(())
/// ```
pub struct MockStore<T> {
    data: Arc<Mutex<HashMap<String, View<T>>>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl<T> std::fmt::Debug for MockStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("entries", &self.data.lock().len())
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<T> Clone for MockStore<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<T> Default for MockStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MockStore<T> {
    /// Creates a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the store contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Sets a predicate that decides which operations fail.
    ///
    /// A failing operation is still recorded but does not touch the stored data.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a copy of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let error = fail.then(|| StoreError::from_message(format!("mock: {op:?} failed")));
        self.operations.lock().push(op);
        error.map_or(Ok(()), Err)
    }
}

impl<T: Send + Sync> CacheStore<T> for MockStore<T> {
    fn get(&self, key: &str) -> Result<Option<View<T>>, StoreError> {
        self.check(StoreOp::Get(key.to_owned()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value<T>, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check(StoreOp::Set {
            key: key.to_owned(),
            shape: value.shape(),
            ttl,
        })?;
        self.data.lock().insert(key.to_owned(), View::from_parts(value, ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check(StoreOp::Delete(key.to_owned()))?;
        self.data.lock().remove(key);
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_operations_are_recorded_but_not_applied() {
        let store = MockStore::<()>::new();
        store.fail_when(|op| matches!(op, StoreOp::Set { .. }));

        assert!(store.set("k", Value::text("v"), Some(Duration::from_secs(5))).is_err());
        assert!(!store.contains_key("k"));
        assert_eq!(
            store.operations(),
            vec![StoreOp::Set {
                key: "k".to_owned(),
                shape: Shape::Text,
                ttl: Some(Duration::from_secs(5)),
            }]
        );

        store.clear_failures();
        store.set("k", Value::text("v"), None).unwrap();
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn clones_share_state() {
        let store = MockStore::<u8>::new();
        let clone = store.clone();
        clone.set("k", Value::object(1), None).unwrap();
        clone.delete("missing").unwrap();

        assert_eq!(store.len(), Some(1));
        assert_eq!(store.operations().last().map(StoreOp::key), Some("missing"));

        store.clear_operations();
        assert!(clone.operations().is_empty());
    }
}
