// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Field names carried by cache events.

pub(crate) const CACHE_NAME: &str = "cache.name";

pub(crate) const CACHE_EVENT_NAME: &str = "cache.event";

pub(crate) const CACHE_OPERATION_NAME: &str = "cache.operation";

pub(crate) const CACHE_ACTIVITY_NAME: &str = "cache.activity";

pub(crate) const CACHE_ERROR_NAME: &str = "cache.error";
