//! Application-shell manifest and revision-keyed cache keys.
//!
//! The shell is the version-pinned set of resources needed to render the
//! card with no network: the home document, the offline fallback document,
//! a fixed image set, and the worker-adjacent script. Entries are immutable
//! once the worker version that created them is superseded; correctness
//! relies on cache keys, not mutation.

use crate::Error;
use url::Url;

/// Home document, served from the precache rather than the pages tier.
pub const HOME_URL: &str = "/";
/// Offline fallback document.
pub const OFFLINE_URL: &str = "/offline";
/// Placeholder image served when an image cannot be resolved offline.
pub const FALLBACK_IMAGE_URL: &str = "/images/fallback-image.jpg";
/// The worker's own script.
pub const WORKER_SCRIPT_URL: &str = "/worker.js";

/// Images precached at install time. Content-hashed by the asset pipeline,
/// so no revision key is needed.
pub const PRECACHED_IMAGES: &[&str] = &[
    "/images/card-front.webp",
    "/images/card-back.webp",
    "/images/fallback-image.jpg",
    "/images/logo.svg",
];

/// API endpoints that produce image bodies; routed to the images tier.
pub const IMAGE_API_ENDPOINTS: &[&str] = &["/api/cardImage", "/api/nationalSign", "/api/flag"];

/// The one structured API endpoint whose cached body gets a field check.
pub const CARD_DATA_ENDPOINT: &str = "/api/cardData";

/// Fields that must be present and non-null in the cached card-data body
/// for it to count as complete.
pub const REQUIRED_CARD_FIELDS: &[&str] = &[
    "cardId",
    "name",
    "title",
    "countryCode",
    "association",
    "membershipNo",
    "webSite",
    "expirationDate",
];

/// Query parameter that carries a revision key in precache cache keys.
pub const REVISION_PARAM: &str = "rev";

/// One entry of the precache manifest.
///
/// A `None` revision means the resource is content-hashed and the URL alone
/// identifies the bytes. A `Some` revision is mixed into the cache key so a
/// version bump produces a new key even when the URL is unchanged; used for
/// the two HTML documents, which have no content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheEntry {
    pub url: String,
    pub revision: Option<String>,
}

impl PrecacheEntry {
    pub fn new(url: impl Into<String>, revision: Option<String>) -> Self {
        Self { url: url.into(), revision }
    }

    /// Derive the cache key for this entry against the app origin.
    ///
    /// The revision rides along as an opaque query parameter, which is why
    /// pathname-based lookups exist everywhere a precached resource is
    /// searched for.
    pub fn cache_key(&self, base: &Url) -> Result<Url, Error> {
        let mut url = base.join(&self.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if let Some(revision) = &self.revision {
            url.query_pairs_mut().append_pair(REVISION_PARAM, revision);
        }
        Ok(url)
    }
}

/// The install-time precache manifest for one build version.
pub fn shell_manifest(version: &str) -> Vec<PrecacheEntry> {
    let mut manifest = vec![
        PrecacheEntry::new(HOME_URL, Some(format!("main-{version}"))),
        PrecacheEntry::new(OFFLINE_URL, Some(format!("offline-{version}"))),
    ];
    manifest.extend(PRECACHED_IMAGES.iter().map(|url| PrecacheEntry::new(*url, None)));
    manifest.push(PrecacheEntry::new(WORKER_SCRIPT_URL, None));
    manifest
}

/// Runtime endpoints preloaded best-effort during install so the api and
/// images tiers are warm before first use.
pub fn runtime_preload_endpoints() -> Vec<&'static str> {
    let mut endpoints = vec![CARD_DATA_ENDPOINT];
    endpoints.extend(IMAGE_API_ENDPOINTS);
    endpoints
}
