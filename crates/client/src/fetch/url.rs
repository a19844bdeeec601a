//! URL resolution helpers for app-relative resources.
//!
//! Everything the worker touches is addressed relative to the configured
//! app origin; cache keys are the resolved absolute URLs. Document lookups
//! additionally try path-normalized variants because navigation requests
//! arrive with and without trailing slashes, and precache keys carry opaque
//! revision query parameters.

use cacheshell_core::Error;
use url::Url;

/// Resolve an app-relative path (or absolute URL) against the app origin.
pub fn resolve(base: &Url, path_or_url: &str) -> Result<Url, Error> {
    base.join(path_or_url).map_err(|e| Error::InvalidUrl(e.to_string()))
}

/// Candidate paths for locating a cached document.
///
/// The home path comes first: the application shell renders any route, so
/// for a document request the precached shell beats every other fallback,
/// including the offline page. After that, the request's own pathname and
/// its trailing-slash twin.
pub fn document_variants(url: &Url) -> Vec<String> {
    let pathname = url.path().to_string();
    let toggled = if pathname == "/" {
        pathname.clone()
    } else if let Some(stripped) = pathname.strip_suffix('/') {
        stripped.to_string()
    } else {
        format!("{pathname}/")
    };

    let mut variants = vec!["/".to_string(), pathname, toggled];
    variants.dedup();
    variants
}
