// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types returned by the read-through cache.

use readthru_store::{Shape, StoreError};

/// A sink refused a value because it cannot hold values of that shape.
///
/// Sink errors are local to the caller whose sink rejected the value; other callers sharing
/// the same load are unaffected.
///
/// # Example
///
/// ```
/// use readthru::SinkError;
///
/// let error = SinkError::from_message("buffer is read-only");
/// assert!(error.to_string().contains("read-only"));
/// ```
#[ohno::error]
#[derive(Clone)]
pub struct SinkError {}

impl SinkError {
    /// Creates a new error from any type that can be converted to an error.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }

    pub(crate) fn rejected(sink: &str, shape: Shape) -> Self {
        Self::caused_by(format!("{sink} sink cannot accept {shape} values"))
    }

    pub(crate) fn invalid_utf8(error: std::str::Utf8Error) -> Self {
        Self::caused_by(format!("string sink rejected bytes that are not valid UTF-8: {error}"))
    }
}

/// The error a [`Getter`](crate::Getter) reports when it cannot load a value.
///
/// Sink errors convert into source errors, so a getter may use `?` on the sink calls it
/// makes while populating a value.
///
/// # Example
///
/// ```
/// use readthru::SourceError;
///
/// let error = SourceError::from_message("not configured");
/// assert!(error.to_string().contains("not configured"));
/// ```
#[ohno::error]
#[derive(Clone)]
#[from(SinkError)]
pub struct SourceError {}

impl SourceError {
    /// Creates a new error from any type that can be converted to an error.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// Errors returned by [`ReadThroughCache`](crate::ReadThroughCache).
///
/// Errors produced while loading a key (backpressure and source failures) are shared: every
/// caller waiting on the same load receives a clone of the same error. Sink errors are local
/// to the caller whose sink rejected the value.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The cache was configured with an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The source rate limit is exhausted; no load was attempted.
    #[error("source rate limit exhausted")]
    Backpressure,

    /// The source failed to load the value.
    #[error("source load failed: {0}")]
    Source(#[source] SourceError),

    /// The caller's sink rejected the value.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Returns `true` if this error reports an exhausted rate limit.
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::Backpressure)
    }

    /// Returns the source error if the load itself failed.
    #[must_use]
    pub fn source_error(&self) -> Option<&SourceError> {
        match self {
            Self::Source(error) => Some(error),
            _ => None,
        }
    }
}

impl From<SourceError> for Error {
    fn from(error: SourceError) -> Self {
        Self::Source(error)
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
