//! Application-shell precaching and runtime warmup.
//!
//! Every entry installs independently: one failed fetch must not abort the
//! rest, and the worker reaches the installed state even with a partial
//! precache. The reset coordinator reuses [`install_shell`] so re-seeding
//! produces an install-equivalent precache, key derivation included.

use cacheshell_core::shell::{self, shell_manifest};
use cacheshell_core::{Error, TierKind};

use crate::strategy;
use crate::worker::CacheWorker;

/// Fetch and store the shell manifest into the version-scoped precache tier.
///
/// Returns how many entries landed.
pub(crate) async fn install_shell(worker: &CacheWorker) -> Result<usize, Error> {
    let precache = worker.tiers.precache_name();
    worker.store.open_tier(precache).await?;

    let manifest = shell_manifest(worker.tiers.version());
    let total = manifest.len();
    let mut installed = 0usize;

    for entry in manifest {
        let target = match worker.origin.join(&entry.url) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(url = %entry.url, %err, "skipping unresolvable precache entry");
                continue;
            }
        };

        match worker.fetcher.fetch(&target).await {
            Ok(response) if response.is_success() => {
                let key = match entry.cache_key(&worker.origin) {
                    Ok(key) => key,
                    Err(err) => {
                        tracing::warn!(url = %entry.url, %err, "skipping underivable precache key");
                        continue;
                    }
                };
                match worker.store.put_entry(precache, key.as_str(), &response.into_stored()).await {
                    Ok(()) => installed += 1,
                    Err(err) => tracing::warn!(url = %entry.url, %err, "failed to store precache entry"),
                }
            }
            Ok(response) => {
                tracing::warn!(url = %entry.url, status = response.status, "precache fetch returned error status");
            }
            Err(err) => {
                tracing::warn!(url = %entry.url, %err, "precache fetch failed");
            }
        }
    }

    tracing::info!(installed, total, precache, "precache populated");
    Ok(installed)
}

/// Best-effort warmup of the runtime tiers during install: the card data
/// endpoint and each image endpoint, each capped so a hung request cannot
/// stall installation.
pub(crate) async fn preload_runtime(worker: &CacheWorker) {
    let cap = worker.config.preload_timeout();
    let mut warmed = 0usize;
    let endpoints = shell::runtime_preload_endpoints();
    let total = endpoints.len();

    for endpoint in endpoints {
        let target = match worker.origin.join(endpoint) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(url = %endpoint, %err, "skipping unresolvable preload endpoint");
                continue;
            }
        };

        let tier = if crate::router::is_image_api_path(endpoint) { TierKind::Images } else { TierKind::Api };
        let cacheable: &[u16] = if tier == TierKind::Api { &[200, 304] } else { &[200] };

        match tokio::time::timeout(cap, worker.fetcher.fetch(&target)).await {
            Ok(Ok(response)) if response.is_success() => {
                strategy::store_through(worker, tier, &target, response, cacheable).await;
                warmed += 1;
            }
            Ok(Ok(response)) => {
                tracing::warn!(url = %endpoint, status = response.status, "preload returned error status");
            }
            Ok(Err(err)) => {
                tracing::warn!(url = %endpoint, %err, "preload fetch failed");
            }
            Err(_) => {
                tracing::warn!(url = %endpoint, "preload timed out");
            }
        }
    }

    tracing::info!(warmed, total, "runtime preload finished");
}

/// Re-fetch the critical image set into the images runtime tier.
///
/// Used after a cache clear so the card renders offline even before the
/// next organic image request.
pub(crate) async fn seed_images(worker: &CacheWorker) {
    let mut seeded = 0usize;

    for image in shell::PRECACHED_IMAGES {
        let target = match worker.origin.join(image) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(url = %image, %err, "skipping unresolvable image");
                continue;
            }
        };
        match worker.fetcher.fetch(&target).await {
            Ok(response) if response.is_success() => {
                strategy::store_through(worker, TierKind::Images, &target, response, &[200]).await;
                seeded += 1;
            }
            Ok(response) => {
                tracing::warn!(url = %image, status = response.status, "image seed returned error status");
            }
            Err(err) => {
                tracing::warn!(url = %image, %err, "image seed fetch failed");
            }
        }
    }

    tracing::info!(seeded, total = shell::PRECACHED_IMAGES.len(), "critical images seeded");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_shell_endpoints, test_worker};

    #[tokio::test(start_paused = true)]
    async fn test_install_shell_populates_precache() {
        let (worker, stub) = test_worker().await;
        seed_shell_endpoints(&stub);

        let installed = install_shell(&worker).await.unwrap();
        let manifest = shell_manifest(worker.tiers.version());
        assert_eq!(installed, manifest.len());

        let precache = worker.tiers.precache_name();
        for entry in &manifest {
            let key = entry.cache_key(&worker.origin).unwrap();
            assert!(
                worker.store.match_exact(precache, key.as_str()).await.unwrap().is_some(),
                "{} missing from precache",
                entry.url
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failed_entry_does_not_abort_the_rest() {
        let (worker, stub) = test_worker().await;
        seed_shell_endpoints(&stub);
        stub.remove("/offline");

        let installed = install_shell(&worker).await.unwrap();
        let manifest = shell_manifest(worker.tiers.version());
        assert_eq!(installed, manifest.len() - 1);

        let precache = worker.tiers.precache_name();
        let home_key = manifest[0].cache_key(&worker.origin).unwrap();
        assert!(worker.store.match_exact(precache, home_key.as_str()).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_warms_api_and_images_tiers() {
        let (worker, stub) = test_worker().await;
        stub.insert("/api/cardData", 200, "application/json", b"{}");
        stub.insert("/api/cardImage", 200, "image/webp", b"img");
        stub.insert("/api/nationalSign", 200, "image/webp", b"img");
        stub.insert("/api/flag", 200, "image/webp", b"img");

        preload_runtime(&worker).await;

        let api = &worker.tiers.policy(TierKind::Api).name;
        let images = &worker.tiers.policy(TierKind::Images).name;
        let card_data = worker.origin.join("/api/cardData").unwrap();
        let flag = worker.origin.join("/api/flag").unwrap();
        assert!(worker.store.match_exact(api, card_data.as_str()).await.unwrap().is_some());
        assert!(worker.store.match_exact(images, flag.as_str()).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_survives_hung_endpoint() {
        let (worker, stub) = test_worker().await;
        stub.insert("/api/cardData", 200, "application/json", b"{}");
        stub.insert("/api/flag", 200, "image/webp", b"img");
        stub.set_delay("/api/cardData", std::time::Duration::from_secs(600));

        preload_runtime(&worker).await;

        let api = &worker.tiers.policy(TierKind::Api).name;
        let images = &worker.tiers.policy(TierKind::Images).name;
        let card_data = worker.origin.join("/api/cardData").unwrap();
        let flag = worker.origin.join("/api/flag").unwrap();
        assert!(worker.store.match_exact(api, card_data.as_str()).await.unwrap().is_none());
        assert!(worker.store.match_exact(images, flag.as_str()).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_images_populates_images_tier() {
        let (worker, stub) = test_worker().await;
        seed_shell_endpoints(&stub);

        seed_images(&worker).await;

        let images = &worker.tiers.policy(TierKind::Images).name;
        for image in shell::PRECACHED_IMAGES {
            let key = worker.origin.join(image).unwrap();
            assert!(worker.store.match_exact(images, key.as_str()).await.unwrap().is_some());
        }
    }
}
