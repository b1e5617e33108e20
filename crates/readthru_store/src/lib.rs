// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Storage layer for read-through caches.
//!
//! This crate defines the [`CacheStore`] trait that every cache backend satisfies, the
//! [`Value`] and [`View`] carriers that move data between a store and its consumers, and
//! [`LruStore`], a bounded in-memory store with least-recently-used eviction and lazy
//! time-to-live expiry.
//!
//! # Overview
//!
//! Values come in exactly three shapes: raw bytes, text and shared objects. A store is
//! either *byte-only* (text is normalized to bytes, objects are rejected) or
//! *object-capable* (any value is stored unmodified). Which one you get is fixed when the
//! store is built.
//!
//! Expiry is evaluated only when an entry is read. An expired entry reports a miss and is
//! reclaimed as part of that lookup; there is no background sweeper.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use readthru_store::{CacheStore, LruStore, Value};
//! use tick::ClockControl;
//!
//! let control = ClockControl::new();
//! let store = LruStore::<()>::builder(2, control.to_clock()).bytes();
//!
//! store.set("greeting", Value::text("hello"), Some(Duration::from_secs(1)))?;
//! assert_eq!(store.get("greeting")?.and_then(|v| v.value().to_bytes()).as_deref(), Some(&b"hello"[..]));
//!
//! control.advance(Duration::from_secs(2));
//! assert!(store.get("greeting")?.is_none());
//! # Ok::<(), readthru_store::StoreError>(())
//! ```

pub mod error;
mod lru;
pub mod memory;
pub(crate) mod store;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
mod value;

#[doc(inline)]
pub use error::{Result, StoreError};
#[doc(inline)]
pub use memory::{EvictionListener, LruStore, LruStoreBuilder, RemovalCause};
#[doc(inline)]
pub use store::CacheStore;
#[doc(inline)]
pub use value::{Shape, Value, View};
