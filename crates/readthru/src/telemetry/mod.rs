// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events for cache operations.
//!
//! Every event carries the cache name, the operation being performed and what happened. Keys
//! are never logged.

use std::fmt::Display;

#[cfg(test)]
pub(crate) mod attributes;
#[cfg(test)]
pub(crate) mod testing;

/// Type alias for cache names used in log events.
pub type CacheName = &'static str;

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheOperation {
    Get,
    Delete,
    Load,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Delete => "cache.delete",
            Self::Load => "cache.load",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Coalesced,
    SourceHit,
    SourceError,
    Backpressure,
    BackendError,
    Deleted,
    PopulateError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Debug,
    Info,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Coalesced => "cache.coalesced",
            Self::SourceHit => "cache.source_hit",
            Self::SourceError => "cache.source_error",
            Self::Backpressure => "cache.backpressure",
            Self::BackendError => "cache.backend_error",
            Self::Deleted => "cache.deleted",
            Self::PopulateError => "cache.populate_error",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Coalesced | Self::SourceHit | Self::Deleted => Severity::Debug,
            Self::Backpressure => Severity::Info,
            Self::SourceError | Self::BackendError | Self::PopulateError => Severity::Error,
        }
    }
}

/// Emits cache events on behalf of one named cache.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CacheTelemetry {
    name: CacheName,
}

impl CacheTelemetry {
    pub(crate) fn new(name: CacheName) -> Self {
        Self { name }
    }

    pub(crate) fn name(self) -> CacheName {
        self.name
    }

    #[inline]
    pub(crate) fn record(self, operation: CacheOperation, activity: CacheActivity) {
        Self::emit(self.name, operation, activity, None);
    }

    #[inline]
    pub(crate) fn record_error(self, operation: CacheOperation, activity: CacheActivity, error: &dyn Display) {
        Self::emit(self.name, operation, activity, Some(error));
    }

    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, error: Option<&dyn Display>) {
        let op = operation.as_str();
        let ev = activity.as_str();
        let error = error.map(tracing::field::display);

        // Tracing level must be constant, so we use a macro to select the appropriate level.
        // Field names must match constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = ev,
                    cache.error = error,
                    "cache.event"
                )
            };
        }

        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::LogCapture, *};

    #[test]
    fn cache_operation_as_str() {
        assert_eq!(CacheOperation::Get.as_str(), "cache.get");
        assert_eq!(CacheOperation::Delete.as_str(), "cache.delete");
        assert_eq!(CacheOperation::Load.as_str(), "cache.load");
    }

    #[test]
    fn cache_activity_severity() {
        assert_eq!(CacheActivity::Hit.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Coalesced.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Deleted.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Backpressure.severity(), Severity::Info);
        assert_eq!(CacheActivity::SourceError.severity(), Severity::Error);
        assert_eq!(CacheActivity::PopulateError.severity(), Severity::Error);
    }

    #[test]
    fn logs_emit_contains_all_fields_and_values() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new("my_test_cache").record_error(CacheOperation::Load, CacheActivity::SourceError, &"upstream down");

        capture.assert_contains(attributes::CACHE_NAME);
        capture.assert_contains(attributes::CACHE_OPERATION_NAME);
        capture.assert_contains(attributes::CACHE_ACTIVITY_NAME);
        capture.assert_contains(attributes::CACHE_ERROR_NAME);
        capture.assert_contains(attributes::CACHE_EVENT_NAME);

        capture.assert_contains("my_test_cache");
        capture.assert_contains(CacheOperation::Load.as_str());
        capture.assert_contains(CacheActivity::SourceError.as_str());
        capture.assert_contains("upstream down");
    }

    #[test]
    fn logs_emit_at_correct_severity_levels() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::new("cache").record(CacheOperation::Get, CacheActivity::BackendError);
        capture.assert_contains("ERROR");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::new("cache").record(CacheOperation::Load, CacheActivity::Backpressure);
        capture.assert_contains("INFO");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::new("cache").record(CacheOperation::Get, CacheActivity::Hit);
        capture.assert_contains("DEBUG");
    }

    #[test]
    fn events_without_error_omit_the_field() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new("cache").record(CacheOperation::Delete, CacheActivity::Deleted);

        capture.assert_contains(CacheActivity::Deleted.as_str());
        assert!(!capture.output().contains(attributes::CACHE_ERROR_NAME));
    }
}
