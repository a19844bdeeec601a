//! Precache shell completeness probe.

use std::time::Duration;

use cacheshell_core::shell::shell_manifest;
use cacheshell_core::{CacheStatus, WorkerMessage};

use super::{PollContext, StatusProbe, run_poll};
use crate::bridge::ClientId;
use crate::worker::CacheWorker;

pub(crate) async fn run(worker: &CacheWorker, source: Option<ClientId>) {
    let ctx = PollContext::new(worker, source);
    run_poll(worker, ctx, PrecacheProbe { worker }).await;
}

struct PrecacheProbe<'w> {
    worker: &'w CacheWorker,
}

impl PrecacheProbe<'_> {
    /// A manifest entry counts as cached if its revision-derived key, its
    /// bare URL, or a pathname scan over the precache keys resolves.
    async fn entry_cached(&self, entry: &cacheshell_core::shell::PrecacheEntry) -> bool {
        let store = &self.worker.store;
        let precache = self.worker.tiers.precache_name();

        if let Ok(key) = entry.cache_key(&self.worker.origin)
            && matches!(store.match_exact(precache, key.as_str()).await, Ok(Some(_)))
        {
            return true;
        }
        if let Ok(bare) = self.worker.origin.join(&entry.url)
            && matches!(store.match_exact(precache, bare.as_str()).await, Ok(Some(_)))
        {
            return true;
        }
        matches!(store.match_pathname(precache, &entry.url).await, Ok(Some(_)))
    }
}

impl StatusProbe for PrecacheProbe<'_> {
    type Status = CacheStatus;

    async fn check(&self) -> CacheStatus {
        let manifest = shell_manifest(self.worker.tiers.version());
        let resources: Vec<String> = manifest.iter().map(|e| e.url.clone()).collect();
        let precache = self.worker.tiers.precache_name();

        // A missing or empty precache means install is still in flight, not
        // that anything is broken.
        match self.worker.store.has_tier(precache).await {
            Ok(true) => {}
            _ => return CacheStatus::all_missing(&resources),
        }
        match self.worker.store.tier_len(precache).await {
            Ok(0) | Err(_) => return CacheStatus::all_missing(&resources),
            Ok(_) => {}
        }

        let mut missing = Vec::new();
        for entry in &manifest {
            if !self.entry_cached(entry).await {
                missing.push(entry.url.clone());
            }
        }
        CacheStatus::from_missing(missing, resources.len())
    }

    fn converged(&self, status: &CacheStatus) -> bool {
        status.all_cached
    }

    fn build(&self, status: &CacheStatus, _elapsed: Duration, is_final: bool) -> WorkerMessage {
        let remaining = status.total_count - status.cached_count;
        let message = if status.all_cached {
            "All critical resources cached".to_string()
        } else if is_final {
            format!("Some resources may still be caching ({remaining} remaining)")
        } else if status.cached_count == 0 {
            "Waiting for worker to cache critical resources...".to_string()
        } else {
            format!("Caching critical resources... {remaining} remaining")
        };
        WorkerMessage::PrecacheStatus { message, status: status.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_shell_endpoints, test_worker};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_reports_all_missing_before_install() {
        let (worker, _stub) = test_worker().await;
        let probe = PrecacheProbe { worker: &worker };

        let status = probe.check().await;
        assert!(!status.all_cached);
        assert_eq!(status.cached_count, 0);
        assert_eq!(status.missing_resources.len() as u32, status.total_count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_install() {
        let (worker, stub) = test_worker().await;
        seed_shell_endpoints(&stub);
        crate::precache::install_shell(&worker).await.unwrap();

        let probe = PrecacheProbe { worker: &worker };
        let status = probe.check().await;
        assert!(status.all_cached);
        assert!(status.missing_resources.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_streams_until_convergence() {
        let (worker, stub) = test_worker().await;
        let (id, mut rx) = worker.bridge.register().await;

        let poller = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { run(&worker, Some(id)).await })
        };

        // First delivery is immediate and not converged.
        let first = rx.recv().await.unwrap();
        let WorkerMessage::PrecacheStatus { status, .. } = &first else {
            panic!("unexpected message {first:?}");
        };
        assert!(!status.all_cached);

        // Install completes while the poll is sleeping.
        seed_shell_endpoints(&stub);
        crate::precache::install_shell(&worker).await.unwrap();

        let second = rx.recv().await.unwrap();
        let WorkerMessage::PrecacheStatus { status, message } = &second else {
            panic!("unexpected message {second:?}");
        };
        assert!(status.all_cached);
        assert_eq!(message, "All critical resources cached");

        poller.await.unwrap();
        assert!(rx.try_recv().is_err(), "poll kept running after convergence");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_at_deadline_with_final_status() {
        let (worker, _stub) = test_worker().await;
        let (id, mut rx) = worker.bridge.register().await;

        let poller = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { run(&worker, Some(id)).await })
        };
        poller.await.unwrap();

        // 10s interval against a 60s deadline: checks at 0..=60s inclusive.
        let mut deliveries = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            deliveries.push(msg);
        }
        assert_eq!(deliveries.len(), 7);
        for msg in &deliveries {
            let WorkerMessage::PrecacheStatus { status, .. } = msg else {
                panic!("unexpected message {msg:?}");
            };
            assert!(!status.all_cached, "converged without any resources");
        }

        let WorkerMessage::PrecacheStatus { message, .. } = deliveries.last().unwrap() else {
            unreachable!()
        };
        assert!(message.contains("may still be caching"), "final message was {message:?}");
    }
}
