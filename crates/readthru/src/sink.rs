// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed destinations that cached values are delivered into.
//!
//! A [`Sink`] sits between the cache and a caller-owned variable. Getters fill it with a freshly
//! loaded value; the cache reads it back as a [`View`] to store and share, and delivers shared
//! views into the sinks of every other caller.
//!
//! Each built-in sink owns a private copy of whatever it hands out or takes in, so a caller's
//! variable never shares mutable storage with a cache entry:
//!
//! | sink | destination | accepts |
//! |---|---|---|
//! | [`StringSink`] | `&mut String` | text, UTF-8 bytes |
//! | [`ByteSink`] | `&mut Vec<u8>` | bytes, text |
//! | [`ObjectSink`] | `&mut T` | objects |

use std::{str, sync::Arc, time::Duration};

use bytes::Bytes;
use readthru_store::{Shape, Value, View};

use crate::SinkError;

/// A destination for values of type `T`.
///
/// The `set_*` methods populate the destination from a fresh load; [`set_view`](Self::set_view)
/// and [`view`](Self::view) exchange values with the cache. A sink that does not support a
/// shape returns a [`SinkError`] and leaves the destination untouched.
pub trait Sink<T>: Send {
    /// Stores a copy of `bytes` into the destination.
    fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Stores a copy of `text` into the destination.
    fn set_string(&mut self, text: &str) -> Result<(), SinkError>;

    /// Stores a copy of `object` into the destination.
    fn set_object(&mut self, object: &T) -> Result<(), SinkError>;

    /// Sets the time-to-live of the value being populated. A zero duration means no expiry.
    fn set_ttl(&mut self, ttl: Duration);

    /// Replaces the destination with a copy of the value carried by `view`, along with its
    /// time-to-live.
    fn set_view(&mut self, view: &View<T>) -> Result<(), SinkError>;

    /// Returns a snapshot of the destination that shares no storage with it.
    fn view(&self) -> Result<View<T>, SinkError>;
}

/// A sink that fills a `String`.
///
/// Bytes are accepted only if they are valid UTF-8. Objects are rejected.
///
/// # Examples
///
/// ```
/// use readthru::{Sink, StringSink, Value, View};
///
/// let mut name = String::new();
/// let mut sink = StringSink::new(&mut name);
/// Sink::<()>::set_view(&mut sink, &View::new(Value::text("alice")))?;
/// assert_eq!(name, "alice");
/// # Ok::<(), readthru::SinkError>(())
/// ```
#[derive(Debug)]
pub struct StringSink<'a> {
    dest: &'a mut String,
    ttl: Option<Duration>,
}

impl<'a> StringSink<'a> {
    /// Creates a sink that writes into `dest`.
    pub fn new(dest: &'a mut String) -> Self {
        Self { dest, ttl: None }
    }

    fn assign(&mut self, text: &str) {
        self.dest.clear();
        self.dest.push_str(text);
    }
}

impl<T> Sink<T> for StringSink<'_> {
    fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let text = str::from_utf8(bytes).map_err(SinkError::invalid_utf8)?;
        self.assign(text);
        Ok(())
    }

    fn set_string(&mut self, text: &str) -> Result<(), SinkError> {
        self.assign(text);
        Ok(())
    }

    fn set_object(&mut self, _object: &T) -> Result<(), SinkError> {
        Err(SinkError::rejected("string", Shape::Object))
    }

    fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = Some(ttl);
    }

    fn set_view(&mut self, view: &View<T>) -> Result<(), SinkError> {
        match view.value() {
            Value::Text(text) => self.assign(text),
            Value::Bytes(bytes) => Sink::<T>::set_bytes(self, bytes)?,
            Value::Object(_) => return Err(SinkError::rejected("string", Shape::Object)),
        }
        self.ttl = view.ttl();
        Ok(())
    }

    fn view(&self) -> Result<View<T>, SinkError> {
        Ok(View::from_parts(Value::text(self.dest.as_str()), self.ttl))
    }
}

/// A sink that fills a `Vec<u8>`.
///
/// Every hand-off copies: the vector never shares storage with a cached value, in either
/// direction. Objects are rejected.
///
/// # Examples
///
/// ```
/// use readthru::{ByteSink, Sink, Value, View};
///
/// let mut buf = Vec::new();
/// let mut sink = ByteSink::new(&mut buf);
/// Sink::<()>::set_view(&mut sink, &View::new(Value::bytes(&b"\x01\x02"[..])))?;
/// assert_eq!(buf, [1, 2]);
/// # Ok::<(), readthru::SinkError>(())
/// ```
#[derive(Debug)]
pub struct ByteSink<'a> {
    dest: &'a mut Vec<u8>,
    ttl: Option<Duration>,
}

impl<'a> ByteSink<'a> {
    /// Creates a sink that writes into `dest`.
    pub fn new(dest: &'a mut Vec<u8>) -> Self {
        Self { dest, ttl: None }
    }

    fn assign(&mut self, bytes: &[u8]) {
        self.dest.clear();
        self.dest.extend_from_slice(bytes);
    }
}

impl<T> Sink<T> for ByteSink<'_> {
    fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.assign(bytes);
        Ok(())
    }

    fn set_string(&mut self, text: &str) -> Result<(), SinkError> {
        self.assign(text.as_bytes());
        Ok(())
    }

    fn set_object(&mut self, _object: &T) -> Result<(), SinkError> {
        Err(SinkError::rejected("byte", Shape::Object))
    }

    fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = Some(ttl);
    }

    fn set_view(&mut self, view: &View<T>) -> Result<(), SinkError> {
        let Some(bytes) = view.value().as_slice() else {
            return Err(SinkError::rejected("byte", view.value().shape()));
        };
        self.assign(bytes);
        self.ttl = view.ttl();
        Ok(())
    }

    fn view(&self) -> Result<View<T>, SinkError> {
        let bytes = Bytes::copy_from_slice(self.dest.as_slice());
        Ok(View::from_parts(Value::Bytes(bytes), self.ttl))
    }
}

/// A sink that fills a `T` by assignment.
///
/// Values move in and out through [`Clone::clone_from`], so the destination is overwritten
/// field by field rather than re-pointed at the cached object. Fields that are themselves
/// shared handles (`Arc`, `Rc`, ...) keep pointing at the same allocation after the copy;
/// mutating through such a field is visible to every holder. Types that need a deep copy must
/// provide it in their `Clone` implementation.
///
/// Bytes and text are rejected.
///
/// # Examples
///
/// ```
/// use readthru::{ObjectSink, Sink, Value, View};
///
/// #[derive(Clone, Default)]
/// struct User {
///     name: String,
/// }
///
/// let cached = View::new(Value::object(User { name: "alice".into() }));
///
/// let mut user = User::default();
/// ObjectSink::new(&mut user).set_view(&cached)?;
/// user.name.push_str("-edited");
///
/// // The cached object is unaffected by edits to the delivered copy.
/// assert_eq!(cached.value().as_object().map(|u| u.name.as_str()), Some("alice"));
/// # Ok::<(), readthru::SinkError>(())
/// ```
#[derive(Debug)]
pub struct ObjectSink<'a, T> {
    dest: &'a mut T,
    ttl: Option<Duration>,
}

impl<'a, T> ObjectSink<'a, T> {
    /// Creates a sink that writes into `dest`.
    pub fn new(dest: &'a mut T) -> Self {
        Self { dest, ttl: None }
    }
}

impl<T: Clone + Send> Sink<T> for ObjectSink<'_, T> {
    fn set_bytes(&mut self, _bytes: &[u8]) -> Result<(), SinkError> {
        Err(SinkError::rejected("object", Shape::Bytes))
    }

    fn set_string(&mut self, _text: &str) -> Result<(), SinkError> {
        Err(SinkError::rejected("object", Shape::Text))
    }

    fn set_object(&mut self, object: &T) -> Result<(), SinkError> {
        self.dest.clone_from(object);
        Ok(())
    }

    fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = Some(ttl);
    }

    fn set_view(&mut self, view: &View<T>) -> Result<(), SinkError> {
        let Some(object) = view.value().as_object() else {
            return Err(SinkError::rejected("object", view.value().shape()));
        };
        self.dest.clone_from(object);
        self.ttl = view.ttl();
        Ok(())
    }

    fn view(&self) -> Result<View<T>, SinkError> {
        let object = Arc::new(self.dest.clone());
        Ok(View::from_parts(Value::from_shared(object), self.ttl))
    }
}

/// The sink a load is staged in before its result is shared with every waiting caller.
///
/// Accepts every shape and keeps the value as is; each caller's own sink copies it afterwards.
pub(crate) struct ViewSink<T> {
    value: Option<Value<T>>,
    ttl: Option<Duration>,
}

impl<T> ViewSink<T> {
    pub(crate) fn new() -> Self {
        Self { value: None, ttl: None }
    }

    /// Returns the staged view, or `None` if nothing was stored.
    pub(crate) fn into_view(self) -> Option<View<T>> {
        self.value.map(|value| View::from_parts(value, self.ttl))
    }
}

impl<T: Clone + Send + Sync> Sink<T> for ViewSink<T> {
    fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.value = Some(Value::Bytes(Bytes::copy_from_slice(bytes)));
        Ok(())
    }

    fn set_string(&mut self, text: &str) -> Result<(), SinkError> {
        self.value = Some(Value::text(text));
        Ok(())
    }

    fn set_object(&mut self, object: &T) -> Result<(), SinkError> {
        self.value = Some(Value::object(object.clone()));
        Ok(())
    }

    fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = Some(ttl);
    }

    fn set_view(&mut self, view: &View<T>) -> Result<(), SinkError> {
        self.value = Some(view.value().clone());
        self.ttl = view.ttl();
        Ok(())
    }

    fn view(&self) -> Result<View<T>, SinkError> {
        self.value
            .clone()
            .map(|value| View::from_parts(value, self.ttl))
            .ok_or_else(|| SinkError::from_message("no value has been stored"))
    }
}
