// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;

/// The representation a [`Value`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// An opaque byte sequence.
    Bytes,
    /// UTF-8 text.
    Text,
    /// A shared, typed object.
    Object,
}

impl Shape {
    /// Returns a short lowercase name for this shape.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Text => "text",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A representation-erased value moved between a store and its consumers.
///
/// Every variant holds shared, immutable storage: cloning a `Value` is O(1) and the clone
/// refers to the same bytes, text or object. Nothing ever mutates a `Value` in place, which
/// is what makes it safe to hand the same value to many concurrent readers. Consumers that
/// need a private, mutable copy make one when they take the value out (see the sinks in the
/// `readthru` crate).
///
/// # Examples
///
/// ```
/// use readthru_store::{Shape, Value};
///
/// let value = Value::<()>::text("hello");
/// assert_eq!(value.shape(), Shape::Text);
/// assert_eq!(value.as_slice(), Some(&b"hello"[..]));
///
/// let object = Value::object(vec![1, 2, 3]);
/// assert_eq!(object.as_object().map(|v| v.len()), Some(3));
/// ```
#[derive(Debug, PartialEq, Eq)]
pub enum Value<T> {
    /// Raw bytes.
    Bytes(Bytes),
    /// UTF-8 text.
    Text(Arc<str>),
    /// A shared object.
    Object(Arc<T>),
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Bytes(bytes) => Self::Bytes(bytes.clone()),
            Self::Text(text) => Self::Text(Arc::clone(text)),
            Self::Object(object) => Self::Object(Arc::clone(object)),
        }
    }
}

impl<T> Value<T> {
    /// Creates a byte value.
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Creates a text value.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    /// Creates an object value, taking ownership of `object`.
    pub fn object(object: T) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Creates an object value from an already shared object.
    pub fn from_shared(object: Arc<T>) -> Self {
        Self::Object(object)
    }

    /// Returns the shape of this value.
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Bytes(_) => Shape::Bytes,
            Self::Text(_) => Shape::Text,
            Self::Object(_) => Shape::Object,
        }
    }

    /// Returns the raw bytes of a byte or text value.
    #[must_use]
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(text) => Some(text.as_bytes()),
            Self::Object(_) => None,
        }
    }

    /// Returns the text of a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) | Self::Object(_) => None,
        }
    }

    /// Returns the shared object of an object value.
    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<T>> {
        match self {
            Self::Object(object) => Some(object),
            Self::Bytes(_) | Self::Text(_) => None,
        }
    }

    /// Returns a byte sequence for byte and text values.
    ///
    /// Byte values share their storage with the returned [`Bytes`]; text is copied.
    #[must_use]
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes.clone()),
            Self::Text(text) => Some(Bytes::copy_from_slice(text.as_bytes())),
            Self::Object(_) => None,
        }
    }
}

impl<T> From<Bytes> for Value<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl<T> From<Vec<u8>> for Value<T> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl<T> From<String> for Value<T> {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

impl<T> From<&str> for Value<T> {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

/// A TTL-tagged snapshot of a [`Value`].
///
/// Views are what sinks produce after a source load and what they accept when a cached
/// value is delivered. A missing or zero TTL means the value never expires.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use readthru_store::{Value, View};
///
/// let view = View::<()>::with_ttl(Value::text("v"), Duration::from_secs(30));
/// assert_eq!(view.ttl(), Some(Duration::from_secs(30)));
///
/// // Non-positive seconds mean "no expiry".
/// assert_eq!(View::<()>::with_ttl_secs(Value::text("v"), 0).ttl(), None);
/// assert_eq!(View::<()>::with_ttl_secs(Value::text("v"), -5).ttl(), None);
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct View<T> {
    value: Value<T>,
    ttl: Option<Duration>,
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            ttl: self.ttl,
        }
    }
}

impl<T> View<T> {
    /// Creates a view that never expires.
    pub fn new(value: Value<T>) -> Self {
        Self { value, ttl: None }
    }

    /// Creates a view with the given time-to-live. A zero duration means no expiry.
    pub fn with_ttl(value: Value<T>, ttl: Duration) -> Self {
        Self {
            value,
            ttl: normalize_ttl(Some(ttl)),
        }
    }

    /// Creates a view from a TTL in whole seconds. Zero or negative means no expiry.
    pub fn with_ttl_secs(value: Value<T>, seconds: i32) -> Self {
        let ttl = u64::try_from(seconds).ok().map(Duration::from_secs);
        Self {
            value,
            ttl: normalize_ttl(ttl),
        }
    }

    /// Creates a view from a value and an optional time-to-live. A zero duration means no expiry.
    pub fn from_parts(value: Value<T>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            ttl: normalize_ttl(ttl),
        }
    }

    /// Returns the carried value.
    #[must_use]
    pub fn value(&self) -> &Value<T> {
        &self.value
    }

    /// Returns the time-to-live, or `None` if the value never expires.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Consumes the view and returns the carried value.
    #[must_use]
    pub fn into_value(self) -> Value<T> {
        self.value
    }

    /// Consumes the view and returns its parts.
    #[must_use]
    pub fn into_parts(self) -> (Value<T>, Option<Duration>) {
        (self.value, self.ttl)
    }
}

impl<T> From<Value<T>> for View<T> {
    fn from(value: Value<T>) -> Self {
        Self::new(value)
    }
}

pub(crate) fn normalize_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}
