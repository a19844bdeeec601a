//! Image endpoint cache completeness probe.

use std::time::Duration;

use cacheshell_core::shell::IMAGE_API_ENDPOINTS;
use cacheshell_core::{CacheStatus, TierKind, WorkerMessage};

use super::{PollContext, StatusProbe, run_poll};
use crate::bridge::ClientId;
use crate::worker::CacheWorker;

pub(crate) async fn run(worker: &CacheWorker, source: Option<ClientId>) {
    let ctx = PollContext::new(worker, source);
    run_poll(worker, ctx, ImagesProbe { worker }).await;
}

struct ImagesProbe<'w> {
    worker: &'w CacheWorker,
}

impl ImagesProbe<'_> {
    /// An endpoint counts as cached if an exact, query-insensitive, or
    /// pathname-scan lookup resolves it in the images tier. The scan is
    /// load-bearing: some platforms normalize request identity
    /// inconsistently, so the stored key may differ from the asked-for URL.
    async fn image_cached(&self, endpoint: &str) -> bool {
        let store = &self.worker.store;
        let tier = &self.worker.tiers.policy(TierKind::Images).name;
        let Ok(url) = self.worker.origin.join(endpoint) else {
            return false;
        };

        if matches!(store.match_exact(tier, url.as_str()).await, Ok(Some(_))) {
            return true;
        }
        if matches!(store.match_ignoring_search(tier, url.as_str()).await, Ok(Some(_))) {
            return true;
        }
        matches!(store.match_pathname(tier, url.path()).await, Ok(Some(_)))
    }
}

impl StatusProbe for ImagesProbe<'_> {
    type Status = CacheStatus;

    async fn check(&self) -> CacheStatus {
        let resources: Vec<String> = IMAGE_API_ENDPOINTS.iter().copied().map(String::from).collect();
        let tier = &self.worker.tiers.policy(TierKind::Images).name;

        match self.worker.store.has_tier(tier).await {
            Ok(true) => {}
            _ => return CacheStatus::all_missing(&resources),
        }
        match self.worker.store.tier_len(tier).await {
            Ok(0) | Err(_) => return CacheStatus::all_missing(&resources),
            Ok(_) => {}
        }

        let mut missing = Vec::new();
        for endpoint in IMAGE_API_ENDPOINTS.iter().copied() {
            if !self.image_cached(endpoint).await {
                missing.push(endpoint.to_string());
            }
        }
        CacheStatus::from_missing(missing, resources.len())
    }

    fn converged(&self, status: &CacheStatus) -> bool {
        status.all_cached
    }

    fn build(&self, status: &CacheStatus, elapsed: Duration, is_final: bool) -> WorkerMessage {
        let remaining = status.total_count - status.cached_count;
        let message = if status.all_cached {
            "All card images cached".to_string()
        } else if is_final {
            format!("Some images may still be caching ({remaining} remaining)")
        } else if status.cached_count == 0 {
            if elapsed > self.worker.config.waiting_threshold() {
                "Card images not cached - may need to be requested first".to_string()
            } else {
                "Waiting for worker to cache card images...".to_string()
            }
        } else {
            format!("Caching card images... {remaining} remaining")
        };
        WorkerMessage::ImagesRuntimeCacheStatus { message, status: status.clone() }
    }
}
