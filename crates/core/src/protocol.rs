//! The page⇄worker message protocol.
//!
//! Both directions are closed tagged unions discriminated by a `type` field,
//! validated at the message boundary before anything is dispatched. Unknown
//! or malformed payloads fail parsing; they never reach a handler.

use crate::Error;
use serde::{Deserialize, Serialize};

/// Messages the page sends to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageMessage {
    /// Activate a waiting worker immediately.
    SkipWaiting,
    /// Clear every cache tier, then re-seed the critical subset.
    ClearAllCaches,
    /// Stream precache completeness status until converged.
    PrecacheStatus,
    /// Stream card-data cache completeness status until converged.
    ApiRuntimeCacheStatus,
    /// Stream image cache completeness status until converged.
    ImagesRuntimeCacheStatus,
}

impl PageMessage {
    /// Parse and validate one message off the wire.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidMessage(e.to_string()))
    }
}

/// Completeness of a tracked resource set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub all_cached: bool,
    pub missing_resources: Vec<String>,
    pub cached_count: u32,
    pub total_count: u32,
}

impl CacheStatus {
    /// Status for a tier that doesn't exist yet or has nothing in it:
    /// everything is missing, which is distinct from an error.
    pub fn all_missing(resources: &[String]) -> Self {
        Self {
            all_cached: false,
            missing_resources: resources.to_vec(),
            cached_count: 0,
            total_count: resources.len() as u32,
        }
    }

    pub fn from_missing(missing: Vec<String>, total: usize) -> Self {
        let cached_count = (total - missing.len()) as u32;
        Self {
            all_cached: missing.is_empty(),
            missing_resources: missing,
            cached_count,
            total_count: total as u32,
        }
    }
}

/// Completeness of the one structured API payload.
///
/// `all_cached` says whether a body is cached at all; `has_all_fields` says
/// whether that body carries every required field with a non-null value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFieldStatus {
    pub all_cached: bool,
    pub has_all_fields: bool,
    pub missing_fields: Vec<String>,
}

impl ApiFieldStatus {
    pub fn not_cached(required: &[&str]) -> Self {
        Self {
            all_cached: false,
            has_all_fields: false,
            missing_fields: required.iter().copied().map(String::from).collect(),
        }
    }

    pub fn converged(&self) -> bool {
        self.all_cached && self.has_all_fields
    }
}

/// Messages the worker sends back to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// The clear-and-reseed operation finished (best effort).
    CachesCleared,
    PrecacheStatus {
        message: String,
        #[serde(flatten)]
        status: CacheStatus,
    },
    ApiRuntimeCacheStatus {
        message: String,
        #[serde(flatten)]
        status: ApiFieldStatus,
    },
    ImagesRuntimeCacheStatus {
        message: String,
        #[serde(flatten)]
        status: CacheStatus,
    },
}
