//! Card-data cache completeness probe.
//!
//! Unlike the resource-set probes, this one inspects the cached body: the
//! card-data endpoint must be cached at all (`allCached`) and its JSON must
//! carry every required field with a non-null value (`hasAllFields`).

use std::time::Duration;

use cacheshell_core::shell::{CARD_DATA_ENDPOINT, REQUIRED_CARD_FIELDS};
use cacheshell_core::{ApiFieldStatus, StoredResponse, TierKind, WorkerMessage};

use super::{PollContext, StatusProbe, run_poll};
use crate::bridge::ClientId;
use crate::worker::CacheWorker;

pub(crate) async fn run(worker: &CacheWorker, source: Option<ClientId>) {
    let ctx = PollContext::new(worker, source);
    run_poll(worker, ctx, ApiProbe { worker }).await;
}

struct ApiProbe<'w> {
    worker: &'w CacheWorker,
}

impl ApiProbe<'_> {
    async fn cached_response(&self) -> Option<StoredResponse> {
        let store = &self.worker.store;
        let tier = &self.worker.tiers.policy(TierKind::Api).name;
        let url = self.worker.origin.join(CARD_DATA_ENDPOINT).ok()?;

        if let Ok(Some(hit)) = store.match_exact(tier, url.as_str()).await {
            return Some(hit);
        }
        if let Ok(Some(hit)) = store.match_ignoring_search(tier, url.as_str()).await {
            return Some(hit);
        }
        store.match_pathname(tier, url.path()).await.ok().flatten()
    }
}

impl StatusProbe for ApiProbe<'_> {
    type Status = ApiFieldStatus;

    async fn check(&self) -> ApiFieldStatus {
        let Some(response) = self.cached_response().await else {
            return ApiFieldStatus::not_cached(REQUIRED_CARD_FIELDS);
        };

        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&response.body) else {
            // Cached but unreadable: report the cache hit, fail the fields.
            return ApiFieldStatus {
                all_cached: true,
                has_all_fields: false,
                missing_fields: REQUIRED_CARD_FIELDS.iter().copied().map(String::from).collect(),
            };
        };

        let missing_fields: Vec<String> = REQUIRED_CARD_FIELDS
            .iter()
            .copied()
            .filter(|field| body.get(*field).is_none_or(|v| v.is_null()))
            .map(String::from)
            .collect();

        ApiFieldStatus { all_cached: true, has_all_fields: missing_fields.is_empty(), missing_fields }
    }

    fn converged(&self, status: &ApiFieldStatus) -> bool {
        status.converged()
    }

    fn build(&self, status: &ApiFieldStatus, elapsed: Duration, is_final: bool) -> WorkerMessage {
        let message = if status.converged() {
            "Card data cached with all fields".to_string()
        } else if status.all_cached {
            format!("Card data cached but missing fields: {}", status.missing_fields.join(", "))
        } else if is_final {
            "Card data may still be caching".to_string()
        } else if elapsed > self.worker.config.waiting_threshold() {
            "Card data not cached - endpoint may need to be requested first".to_string()
        } else {
            "Waiting for worker to cache card data...".to_string()
        };
        WorkerMessage::ApiRuntimeCacheStatus { message, status: status.clone() }
    }
}
