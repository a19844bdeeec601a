//! Caching strategies: how a routed request actually gets served.
//!
//! Network-first uses a soft timeout: after the bounded wait it serves
//! whatever the tier has, but the in-flight fetch is not aborted and still
//! populates the tier when it lands. Caching is always best-effort; a
//! failed write never fails the request being served.

use std::sync::Arc;

use cacheshell_core::{Error, StoredResponse, TierKind, TierPolicy};
use cacheshell_client::FetchResponse;
use url::Url;

use crate::router::{RequestContext, Route};
use crate::worker::CacheWorker;

pub(crate) async fn run_route(
    worker: &Arc<CacheWorker>,
    ctx: &RequestContext,
    route: Route,
) -> Result<StoredResponse, Error> {
    match route {
        Route::NetworkFirst { tier, cacheable } => network_first(worker, ctx, tier, cacheable).await,
        Route::CacheFirst { tier, cacheable } => cache_first(worker, ctx, tier, cacheable).await,
        Route::NetworkOnly => network_only(worker, ctx).await,
    }
}

async fn network_first(
    worker: &Arc<CacheWorker>,
    ctx: &RequestContext,
    tier: TierKind,
    cacheable: &'static [u16],
) -> Result<StoredResponse, Error> {
    let fetcher = Arc::clone(&worker.fetcher);
    let url = ctx.url.clone();
    let mut in_flight = tokio::spawn(async move { fetcher.fetch(&url).await });

    let soft_wait = tokio::time::sleep(worker.config.network_timeout());
    tokio::pin!(soft_wait);

    tokio::select! {
        joined = &mut in_flight => match flatten_join(joined) {
            Ok(response) => Ok(store_through(worker, tier, &ctx.url, response, cacheable).await),
            Err(err) => {
                tracing::debug!(url = %ctx.url, %err, "network failed, trying tier");
                tier_lookup(worker, tier, &ctx.url).await.ok_or(err)
            }
        },
        _ = &mut soft_wait => {
            if let Some(cached) = tier_lookup(worker, tier, &ctx.url).await {
                let worker = Arc::clone(worker);
                let request_url = ctx.url.clone();
                tokio::spawn(async move {
                    if let Ok(Ok(response)) = in_flight.await {
                        store_through(&worker, tier, &request_url, response, cacheable).await;
                    }
                });
                return Ok(cached);
            }
            // Nothing cached: the bounded wait is over but failing now would
            // lose a response that may still arrive.
            let response = flatten_join(in_flight.await)?;
            Ok(store_through(worker, tier, &ctx.url, response, cacheable).await)
        }
    }
}

async fn cache_first(
    worker: &CacheWorker,
    ctx: &RequestContext,
    tier: TierKind,
    cacheable: &'static [u16],
) -> Result<StoredResponse, Error> {
    if let Some(hit) = tier_lookup(worker, tier, &ctx.url).await {
        return Ok(hit);
    }
    let response = worker.fetcher.fetch(&ctx.url).await?;
    Ok(store_through(worker, tier, &ctx.url, response, cacheable).await)
}

async fn network_only(worker: &CacheWorker, ctx: &RequestContext) -> Result<StoredResponse, Error> {
    let response = worker.fetcher.fetch(&ctx.url).await?;
    Ok(response.into_stored())
}

/// Exact, then query-insensitive lookup in one tier. Storage errors count
/// as misses; they are logged here and absorbed.
pub(crate) async fn tier_lookup(worker: &CacheWorker, tier: TierKind, url: &Url) -> Option<StoredResponse> {
    let name = &worker.tiers.policy(tier).name;
    match worker.store.match_exact(name, url.as_str()).await {
        Ok(Some(hit)) => return Some(hit),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(tier = %name, %err, "tier lookup failed");
            return None;
        }
    }
    match worker.store.match_ignoring_search(name, url.as_str()).await {
        Ok(hit) => hit,
        Err(err) => {
            tracing::warn!(tier = %name, %err, "tier lookup failed");
            None
        }
    }
}

/// Convert a network response for serving and, when its status is cacheable
/// for this route, write it through to the tier with eviction applied.
pub(crate) async fn store_through(
    worker: &CacheWorker,
    tier: TierKind,
    request_url: &Url,
    response: FetchResponse,
    cacheable: &[u16],
) -> StoredResponse {
    let stored = response.into_stored();
    if !cacheable.contains(&stored.status) {
        return stored;
    }
    let policy = worker.tiers.policy(tier).clone();
    if let Err(err) = put_with_quota(worker, &policy, request_url.as_str(), &stored).await {
        tracing::warn!(tier = %policy.name, %err, "failed to cache response");
    }
    stored
}

async fn put_with_quota(
    worker: &CacheWorker,
    policy: &TierPolicy,
    cache_key: &str,
    stored: &StoredResponse,
) -> Result<(), Error> {
    worker.store.open_tier(&policy.name).await?;
    match worker.store.put_entry(&policy.name, cache_key, stored).await {
        Err(Error::QuotaExceeded(_)) if policy.purge_on_quota_error => {
            tracing::warn!(tier = %policy.name, "quota exceeded, purging tier and retrying write");
            worker.store.purge_tier(&policy.name).await?;
            worker.store.put_entry(&policy.name, cache_key, stored).await?;
        }
        Err(err) => return Err(err),
        Ok(()) => {}
    }
    worker.store.evict(&policy.name, policy.max_entries, policy.max_age_seconds).await?;
    Ok(())
}

fn flatten_join(
    joined: Result<Result<FetchResponse, Error>, tokio::task::JoinError>,
) -> Result<FetchResponse, Error> {
    match joined {
        Ok(inner) => inner,
        Err(join_err) => Err(Error::HttpError(format!("fetch task failed: {join_err}"))),
    }
}
