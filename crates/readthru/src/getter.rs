// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The source a read-through cache loads missing values from.

use std::{fmt, sync::Arc};

use readthru_store::View;

use crate::{Sink, SourceError};

/// Loads the value for a key from the underlying source.
///
/// A getter populates the sink it is handed with bytes, text or an object, and may set a
/// time-to-live with [`Sink::set_ttl`]. Returning an error, or returning without storing a
/// value, aborts the load for every caller waiting on the same key; nothing is written to the
/// cache.
///
/// The sink belongs to the load, not to any one caller. It accepts every shape; each caller's
/// own sink receives a copy once the load has finished.
///
/// The cache invokes at most one getter call per key at a time, so implementations do not need
/// their own de-duplication.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use readthru::{Getter, Sink, SourceError};
///
/// struct Greeter;
///
/// impl Getter<()> for Greeter {
///     async fn get(&self, key: &str, sink: &mut dyn Sink<()>) -> Result<(), SourceError> {
///         sink.set_string(&format!("hello, {key}"))?;
///         sink.set_ttl(Duration::from_secs(60));
///         Ok(())
///     }
/// }
/// ```
pub trait Getter<T>: Send + Sync {
    /// Loads `key` into `sink`.
    fn get(&self, key: &str, sink: &mut dyn Sink<T>) -> impl Future<Output = Result<(), SourceError>> + Send;
}

impl<T, G> Getter<T> for Arc<G>
where
    G: Getter<T> + ?Sized,
{
    fn get(&self, key: &str, sink: &mut dyn Sink<T>) -> impl Future<Output = Result<(), SourceError>> + Send {
        (**self).get(key, sink)
    }
}

/// A [`Getter`] built from an async closure that returns a [`View`].
///
/// Created by [`getter_fn`].
pub struct GetterFn<F> {
    load: F,
}

impl<F> fmt::Debug for GetterFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetterFn").finish_non_exhaustive()
    }
}

/// Wraps an async closure as a [`Getter`].
///
/// The closure receives the key and returns the loaded value as a [`View`]; the adapter
/// delivers it into the sink with [`Sink::set_view`].
///
/// # Examples
///
/// ```
/// use readthru::{SourceError, Value, View, getter_fn};
///
/// let getter = getter_fn(|key: String| async move {
///     if key == "k" {
///         return Err(SourceError::from_message("not configured"));
///     }
///     Ok(View::<()>::with_ttl_secs(Value::text(key), 30))
/// });
/// # let _ = getter;
/// ```
pub fn getter_fn<F>(load: F) -> GetterFn<F> {
    GetterFn { load }
}

impl<T, F, Fut> Getter<T> for GetterFn<F>
where
    T: Send + Sync,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<View<T>, SourceError>> + Send,
{
    fn get(&self, key: &str, sink: &mut dyn Sink<T>) -> impl Future<Output = Result<(), SourceError>> + Send {
        let load = (self.load)(key.to_owned());
        async move {
            let view = load.await?;
            sink.set_view(&view)?;
            Ok(())
        }
    }
}
