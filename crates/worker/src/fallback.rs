//! Last-line resolution when a strategy fails outright.
//!
//! Each request class gets an ordered chain of lookups; the order is a data
//! structure walked by one resolver, and earlier steps are authoritative.
//! A document request prefers the precached app shell over everything else,
//! offline page included, because the shell can render any route. Only when
//! a chain is exhausted does the class's last resort apply: a synthesized
//! inline body, or for scripts and fonts a hard error.

use std::sync::Arc;

use cacheshell_core::shell::{self, shell_manifest};
use cacheshell_core::{Error, StoredResponse, TierKind};
use cacheshell_client::fetch::url::document_variants;
use url::Url;

use crate::router::{Destination, RequestContext};
use crate::strategy;
use crate::worker::CacheWorker;

/// One step of a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// Precache search across document path variants: manifest-derived keys,
    /// bare URLs, then a pathname scan over every precache key.
    PrecacheDocument,
    /// Precache search for this exact resource, tolerating revision params.
    PrecachePath,
    /// One runtime tier: exact, query-insensitive, then pathname scan.
    Tier(TierKind),
    /// Every tier: exact key, then pathname scan.
    AnyTier,
    /// A specific shell resource (offline document, fallback image).
    ShellResource(&'static str),
}

/// What to do when every lookup in the chain misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastResort {
    OfflineDocument,
    PlaceholderImage,
    EmptyStylesheet,
    OfflineApiBody,
    TransportError,
}

/// Request classes with distinct fallback chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FallbackClass {
    Document,
    Image,
    Style,
    Script,
    Font,
    ImageApi,
    Api,
    Other,
}

fn classify(ctx: &RequestContext) -> FallbackClass {
    let path = ctx.url.path();
    if crate::router::is_image_api_path(path) {
        return FallbackClass::ImageApi;
    }
    if path.starts_with("/api/") {
        return FallbackClass::Api;
    }
    match ctx.destination {
        Destination::Document => FallbackClass::Document,
        Destination::Image => FallbackClass::Image,
        Destination::Style => FallbackClass::Style,
        Destination::Script => FallbackClass::Script,
        Destination::Font => FallbackClass::Font,
        Destination::Other => FallbackClass::Other,
    }
}

fn chain(class: FallbackClass) -> (&'static [Lookup], LastResort) {
    match class {
        FallbackClass::Document => (
            &[
                Lookup::PrecacheDocument,
                Lookup::Tier(TierKind::Pages),
                Lookup::AnyTier,
                Lookup::ShellResource(shell::OFFLINE_URL),
            ],
            LastResort::OfflineDocument,
        ),
        FallbackClass::Image => (
            &[
                Lookup::PrecachePath,
                Lookup::Tier(TierKind::Images),
                Lookup::AnyTier,
                Lookup::ShellResource(shell::FALLBACK_IMAGE_URL),
            ],
            LastResort::PlaceholderImage,
        ),
        FallbackClass::Style => (&[Lookup::Tier(TierKind::Static)], LastResort::EmptyStylesheet),
        FallbackClass::Script => (&[Lookup::Tier(TierKind::Static)], LastResort::TransportError),
        FallbackClass::Font => (&[Lookup::Tier(TierKind::Font)], LastResort::TransportError),
        FallbackClass::ImageApi => (
            &[
                Lookup::PrecachePath,
                Lookup::Tier(TierKind::Images),
                Lookup::Tier(TierKind::Api),
                Lookup::AnyTier,
                Lookup::ShellResource(shell::FALLBACK_IMAGE_URL),
            ],
            LastResort::PlaceholderImage,
        ),
        FallbackClass::Api => (&[Lookup::Tier(TierKind::Api), Lookup::AnyTier], LastResort::OfflineApiBody),
        FallbackClass::Other => (&[], LastResort::TransportError),
    }
}

/// Walk the chain for this request's class; first hit wins.
pub(crate) async fn resolve(worker: &Arc<CacheWorker>, ctx: &RequestContext) -> Result<StoredResponse, Error> {
    let class = classify(ctx);
    let (lookups, last_resort) = chain(class);

    for lookup in lookups {
        let hit = match lookup {
            Lookup::PrecacheDocument => precache_document_lookup(worker, ctx).await,
            Lookup::PrecachePath => precache_path_lookup(worker, &ctx.url).await,
            Lookup::Tier(kind) => tier_path_lookup(worker, *kind, &ctx.url).await,
            Lookup::AnyTier => any_tier_lookup(worker, &ctx.url).await,
            Lookup::ShellResource(resource) => shell_resource_lookup(worker, resource).await,
        };
        if let Some(response) = hit {
            tracing::debug!(url = %ctx.url, ?lookup, "fallback hit");
            return Ok(response);
        }
    }

    tracing::warn!(url = %ctx.url, ?class, "nothing cached anywhere, using last resort");
    synthesize(ctx, last_resort)
}

async fn precache_document_lookup(worker: &CacheWorker, ctx: &RequestContext) -> Option<StoredResponse> {
    let precache = worker.tiers.precache_name();
    let manifest = shell_manifest(worker.tiers.version());

    for variant in document_variants(&ctx.url) {
        for entry in manifest.iter().filter(|e| e.url == variant) {
            if let Ok(key) = entry.cache_key(&worker.origin)
                && let Some(hit) = absorb(worker.store.match_exact(precache, key.as_str()).await)
            {
                return Some(hit);
            }
        }

        if let Ok(bare) = worker.origin.join(&variant)
            && let Some(hit) = absorb(worker.store.match_exact(precache, bare.as_str()).await)
        {
            return Some(hit);
        }

        if let Some(hit) = absorb(worker.store.match_pathname(precache, &variant).await) {
            return Some(hit);
        }
    }
    None
}

async fn precache_path_lookup(worker: &CacheWorker, url: &Url) -> Option<StoredResponse> {
    let precache = worker.tiers.precache_name();
    if let Some(hit) = absorb(worker.store.match_exact(precache, url.as_str()).await) {
        return Some(hit);
    }
    if let Some(hit) = absorb(worker.store.match_ignoring_search(precache, url.as_str()).await) {
        return Some(hit);
    }
    absorb(worker.store.match_pathname(precache, url.path()).await)
}

async fn tier_path_lookup(worker: &CacheWorker, kind: TierKind, url: &Url) -> Option<StoredResponse> {
    if let Some(hit) = strategy::tier_lookup(worker, kind, url).await {
        return Some(hit);
    }
    let name = &worker.tiers.policy(kind).name;
    absorb(worker.store.match_pathname(name, url.path()).await)
}

async fn any_tier_lookup(worker: &CacheWorker, url: &Url) -> Option<StoredResponse> {
    absorb(worker.store.match_any_tier(url.as_str(), url.path()).await)
}

async fn shell_resource_lookup(worker: &CacheWorker, resource: &str) -> Option<StoredResponse> {
    let precache = worker.tiers.precache_name();
    let manifest = shell_manifest(worker.tiers.version());

    for entry in manifest.iter().filter(|e| e.url == resource) {
        if let Ok(key) = entry.cache_key(&worker.origin)
            && let Some(hit) = absorb(worker.store.match_exact(precache, key.as_str()).await)
        {
            return Some(hit);
        }
    }
    absorb(worker.store.match_pathname(precache, resource).await)
}

/// Storage errors during fallback count as misses.
fn absorb(result: Result<Option<StoredResponse>, Error>) -> Option<StoredResponse> {
    match result {
        Ok(hit) => hit,
        Err(err) => {
            tracing::warn!(%err, "fallback lookup failed");
            None
        }
    }
}

const OFFLINE_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Offline</title>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"></head>\
<body><h1>You are offline</h1><p>Please check your connection and try again.</p></body></html>";

const PLACEHOLDER_SVG: &str = "<svg width=\"100\" height=\"100\" xmlns=\"http://www.w3.org/2000/svg\">\
<rect width=\"100\" height=\"100\" fill=\"#ccc\"/>\
<text x=\"50\" y=\"50\" text-anchor=\"middle\">No Image</text></svg>";

const EMPTY_STYLESHEET: &str = "/* styles unavailable offline */";

fn synthesize(ctx: &RequestContext, last_resort: LastResort) -> Result<StoredResponse, Error> {
    let url = ctx.url.to_string();
    match last_resort {
        LastResort::OfflineDocument => Ok(StoredResponse::new(
            url,
            200,
            Some("text/html".to_string()),
            OFFLINE_HTML.as_bytes().to_vec(),
        )),
        LastResort::PlaceholderImage => Ok(StoredResponse::new(
            url,
            200,
            Some("image/svg+xml".to_string()),
            PLACEHOLDER_SVG.as_bytes().to_vec(),
        )),
        LastResort::EmptyStylesheet => Ok(StoredResponse::new(
            url,
            200,
            Some("text/css".to_string()),
            EMPTY_STYLESHEET.as_bytes().to_vec(),
        )),
        LastResort::OfflineApiBody => {
            let body = serde_json::json!({
                "error": "Service unavailable offline",
                "offline": true,
            });
            Ok(StoredResponse::new(
                url,
                503,
                Some("application/json".to_string()),
                serde_json::to_vec(&body).unwrap_or_default(),
            ))
        }
        LastResort::TransportError => Err(Error::NotCached(url)),
    }
}
