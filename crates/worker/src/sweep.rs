//! Activation sweep: reclaim storage left behind by superseded versions.
//!
//! Three independent passes, each best-effort with bounded retries:
//! precache tiers from other versions, runtime tiers not in the current
//! config, and orphaned eviction bookkeeping whose tier no longer exists.

use std::time::Duration;

use cacheshell_core::retry::{fixed, with_retry};
use cacheshell_core::tiers::{is_precache_tier_name, is_runtime_tier_name};
use cacheshell_core::Error;

use crate::worker::CacheWorker;

const DELETE_ATTEMPTS: usize = 3;
const DELETE_DELAY: Duration = Duration::from_millis(100);

pub(crate) async fn run(worker: &CacheWorker) {
    let names = match worker.store.tier_names().await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(%err, "activation sweep could not enumerate tiers");
            return;
        }
    };

    let current_precache = worker.tiers.precache_name();
    let current_runtime = worker.tiers.runtime_names();

    for name in &names {
        let stale_precache = is_precache_tier_name(name) && name != current_precache;
        let stale_runtime = is_runtime_tier_name(name) && !current_runtime.contains(&name.as_str());
        if !(stale_precache || stale_runtime) {
            continue;
        }

        let result = with_retry(&fixed(DELETE_ATTEMPTS, DELETE_DELAY), || delete_tier_once(worker, name)).await;
        match result {
            Ok(()) => tracing::info!(tier = %name, "stale tier deleted"),
            Err(err) => tracing::warn!(tier = %name, %err, "stale tier still present after retries"),
        }
    }

    match worker.store.meta_tiers().await {
        Ok(meta_names) => {
            for name in meta_names {
                let orphaned = match worker.store.has_tier(&name).await {
                    Ok(exists) => !exists,
                    Err(err) => {
                        tracing::warn!(tier = %name, %err, "could not check tier for orphaned bookkeeping");
                        false
                    }
                };
                if !orphaned {
                    continue;
                }
                let result =
                    with_retry(&fixed(DELETE_ATTEMPTS, DELETE_DELAY), || delete_meta_once(worker, &name)).await;
                match result {
                    Ok(()) => tracing::info!(tier = %name, "orphaned eviction bookkeeping deleted"),
                    Err(err) => tracing::warn!(tier = %name, %err, "orphaned bookkeeping still present"),
                }
            }
        }
        Err(err) => tracing::warn!(%err, "activation sweep could not enumerate bookkeeping"),
    }
}

async fn delete_tier_once(worker: &CacheWorker, name: &str) -> Result<(), Error> {
    match worker.store.delete_tier(name).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::DeleteBlocked(name.to_string())),
        Err(err) => Err(err),
    }
}

async fn delete_meta_once(worker: &CacheWorker, name: &str) -> Result<(), Error> {
    match worker.store.delete_tier_meta(name).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::DeleteBlocked(name.to_string())),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_worker;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_deletes_old_version_tiers() {
        let (worker, _stub) = test_worker().await;
        for name in ["precache-v0.9", "pages-runtime-v0.9", "images-runtime-v0.9"] {
            worker.store.open_tier(name).await.unwrap();
        }
        worker.store.open_tier(worker.tiers.precache_name()).await.unwrap();

        run(&worker).await;

        let remaining = worker.store.tier_names().await.unwrap();
        assert_eq!(remaining, vec![worker.tiers.precache_name().to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_current_tiers() {
        let (worker, _stub) = test_worker().await;
        let pages = worker.tiers.policy(cacheshell_core::TierKind::Pages).name.clone();
        worker.store.open_tier(&pages).await.unwrap();
        worker.store.open_tier(worker.tiers.precache_name()).await.unwrap();

        run(&worker).await;

        let remaining = worker.store.tier_names().await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_ignores_foreign_tiers() {
        let (worker, _stub) = test_worker().await;
        worker.store.open_tier("unrelated-store").await.unwrap();

        run(&worker).await;

        assert!(worker.store.has_tier("unrelated-store").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_reclaims_orphaned_bookkeeping() {
        let (worker, _stub) = test_worker().await;
        worker.store.open_tier("images-runtime-v0.9").await.unwrap();
        worker.store.record_eviction("images-runtime-v0.9", 2).await.unwrap();

        run(&worker).await;

        assert!(worker.store.meta_tiers().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_bookkeeping() {
        let (worker, _stub) = test_worker().await;
        let images = worker.tiers.policy(cacheshell_core::TierKind::Images).name.clone();
        worker.store.open_tier(&images).await.unwrap();
        worker.store.record_eviction(&images, 1).await.unwrap();

        run(&worker).await;

        assert_eq!(worker.store.meta_tiers().await.unwrap(), vec![images]);
    }
}
