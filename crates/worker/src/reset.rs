//! "Reset all offline data": clear every tier, re-seed the critical subset,
//! notify the page.
//!
//! Deletion is fully attempted before re-seeding begins, and re-seeding
//! fully attempted before notification. Every step's failure is logged and
//! swallowed so the requesting page always hears back. Seeding fetches from
//! the network, never from the caches being cleared, which is what makes
//! running this twice converge to the same state as running it once.

use std::time::Duration;

use cacheshell_core::retry::{fixed, with_retry};
use cacheshell_core::{Error, WorkerMessage};

use crate::bridge::ClientId;
use crate::precache;
use crate::worker::CacheWorker;

const PER_TIER_ATTEMPTS: usize = 3;
const PER_TIER_DELAY: Duration = Duration::from_millis(100);
const BULK_PASS_ATTEMPTS: usize = 2;
const BULK_PASS_DELAY: Duration = Duration::from_millis(200);

pub(crate) async fn clear_all(worker: &CacheWorker, source: Option<ClientId>) {
    let names = match worker.store.tier_names().await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(%err, "could not enumerate tiers for reset");
            worker.bridge.deliver(source, WorkerMessage::CachesCleared).await;
            return;
        }
    };

    if names.is_empty() {
        tracing::info!("no tiers to clear");
        worker.bridge.deliver(source, WorkerMessage::CachesCleared).await;
        return;
    }

    tracing::info!(count = names.len(), "clearing all cache tiers");
    let mut failed = 0usize;
    for name in &names {
        let result =
            with_retry(&fixed(PER_TIER_ATTEMPTS, PER_TIER_DELAY), || delete_tier_once(worker, name)).await;
        if let Err(err) = result {
            failed += 1;
            tracing::warn!(tier = %name, %err, "tier deletion failed after retries");
        }
    }
    tracing::info!(succeeded = names.len() - failed, failed, "tier deletion pass finished");

    // Final bulk pass over anything still present.
    match worker.store.tier_names().await {
        Ok(remaining) if !remaining.is_empty() => {
            tracing::warn!(?remaining, "tiers still present after deletion, retrying");
            for name in &remaining {
                let result =
                    with_retry(&fixed(BULK_PASS_ATTEMPTS, BULK_PASS_DELAY), || delete_tier_once(worker, name)).await;
                if let Err(err) = result {
                    tracing::warn!(tier = %name, %err, "tier survived the final retry pass");
                }
            }
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "could not re-enumerate tiers after deletion"),
    }

    // Re-seed from the network so the card keeps working offline: the
    // critical images first, then an install-equivalent precache.
    precache::seed_images(worker).await;
    if let Err(err) = precache::install_shell(worker).await {
        tracing::warn!(%err, "precache re-seed incomplete");
    }

    worker.bridge.deliver(source, WorkerMessage::CachesCleared).await;
}

async fn delete_tier_once(worker: &CacheWorker, name: &str) -> Result<(), Error> {
    match worker.store.delete_tier(name).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::DeleteBlocked(name.to_string())),
        Err(err) => Err(err),
    }
}
