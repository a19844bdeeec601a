//! Worker lifecycle: install, activate, skip-waiting.
//!
//! Install populates the precache and warms the runtime tiers; activation
//! sweeps superseded storage. Both are best-effort: a partial precache
//! still reaches the installed state, and a failed sweep still activates.

use crate::worker::CacheWorker;
use crate::{precache, sweep};

/// Lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
}

impl CacheWorker {
    /// Run the install phase: precache the shell, then warm runtime tiers.
    pub async fn install(&self) {
        self.set_state(WorkerState::Installing);

        if let Err(err) = precache::install_shell(self).await {
            tracing::warn!(%err, "precache install incomplete");
        }
        precache::preload_runtime(self).await;

        self.set_state(WorkerState::Installed);
        tracing::info!(version = self.tiers.version(), "worker installed");
    }

    /// Run the activate phase: sweep stale storage and take control.
    pub async fn activate(&self) {
        self.set_state(WorkerState::Activating);
        sweep::run(self).await;
        self.set_state(WorkerState::Activated);
        tracing::info!(version = self.tiers.version(), "worker activated");
    }

    /// Activate immediately if not already active. Idempotent.
    pub async fn skip_waiting(&self) {
        if self.state() == WorkerState::Activated {
            return;
        }
        tracing::info!("skip waiting requested, activating now");
        self.activate().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_shell_endpoints, test_worker};

    #[tokio::test(start_paused = true)]
    async fn test_install_reaches_installed_even_offline() {
        let (worker, stub) = test_worker().await;
        stub.set_offline(true);

        worker.install().await;
        assert_eq!(worker.state(), WorkerState::Installed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_then_activate() {
        let (worker, stub) = test_worker().await;
        seed_shell_endpoints(&stub);

        worker.install().await;
        worker.activate().await;
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_waiting_activates_installed_worker() {
        let (worker, stub) = test_worker().await;
        seed_shell_endpoints(&stub);
        worker.install().await;

        worker.skip_waiting().await;
        assert_eq!(worker.state(), WorkerState::Activated);

        // Second call is a no-op.
        worker.skip_waiting().await;
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_version_bump_isolates_tiers() {
        let (worker, stub) = test_worker().await;
        seed_shell_endpoints(&stub);
        stub.insert("/api/cardData", 200, "application/json", b"{}");
        stub.insert("/api/cardImage", 200, "image/webp", b"img");
        stub.insert("/api/nationalSign", 200, "image/webp", b"img");
        stub.insert("/api/flag", 200, "image/webp", b"img");
        worker.install().await;
        worker.activate().await;

        let old_names = worker.store.tier_names().await.unwrap();
        assert!(!old_names.is_empty());

        // A new build version boots against the same store.
        let (next, stub2) = crate::testing::test_worker_with_version(worker.store.clone(), "v2.0.0").await;
        seed_shell_endpoints(&stub2);
        next.install().await;
        next.activate().await;

        let remaining = next.store.tier_names().await.unwrap();
        for name in &old_names {
            assert!(!remaining.contains(name), "old tier {name} survived activation");
        }
        assert!(remaining.contains(&next.tiers.precache_name().to_string()));
    }
}
