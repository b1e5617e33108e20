// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for store operations.

use crate::Shape;

/// An error from a store operation.
///
/// "Not found" is never an error: stores report a missing or expired key as `Ok(None)`.
/// A `StoreError` means the backend itself misbehaved or refused the request, for example
/// a byte-only store being handed an object value.
///
/// The error is cheap to clone so that a single failure can be shared between several
/// waiters.
///
/// # Example
///
/// ```
/// use readthru_store::StoreError;
///
/// let error = StoreError::from_message("backend unavailable");
/// assert!(error.to_string().contains("backend unavailable"));
/// ```
#[ohno::error]
#[derive(Clone)]
pub struct StoreError {}

impl StoreError {
    /// Creates a new error from any type that can be converted to an error.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }

    pub(crate) fn type_mismatch(shape: Shape) -> Self {
        Self::caused_by(format!("byte-only store cannot hold {shape} values"))
    }
}

/// A specialized [`Result`] type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
