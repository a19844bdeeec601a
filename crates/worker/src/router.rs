//! Request classification: pick a strategy and tier for each fetch.
//!
//! Rules are evaluated in the order listed; the first predicate match wins.
//! The root document deliberately matches no rule, so it rides the
//! network-only default and, offline, falls through to the precached app
//! shell instead of the pages tier.

use cacheshell_core::TierKind;
use cacheshell_core::shell::IMAGE_API_ENDPOINTS;
use url::Url;

/// What kind of resource the request is for, from the requester's point of
/// view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Other,
}

/// Everything the router and fallback resolver need to know about one
/// intercepted request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub url: Url,
    pub destination: Destination,
    pub is_navigation: bool,
}

impl RequestContext {
    /// A top-level navigation to a document.
    pub fn navigation(url: Url) -> Self {
        Self { url, destination: Destination::Document, is_navigation: true }
    }

    /// A subresource request.
    pub fn subresource(url: Url, destination: Destination) -> Self {
        Self { url, destination, is_navigation: false }
    }
}

/// The strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Try the network with a soft timeout, fall back to the tier.
    NetworkFirst { tier: TierKind, cacheable: &'static [u16] },
    /// Serve from the tier, fetch and populate on a miss.
    CacheFirst { tier: TierKind, cacheable: &'static [u16] },
    /// Straight to the network, nothing cached.
    NetworkOnly,
}

const OK_ONLY: &[u16] = &[200];
const OK_OR_NOT_MODIFIED: &[u16] = &[200, 304];

pub fn is_static_asset_path(path: &str) -> bool {
    path.starts_with("/_next/static/") || path.ends_with(".css") || path.ends_with(".js") || path.ends_with(".mjs")
}

pub fn is_image_api_path(path: &str) -> bool {
    IMAGE_API_ENDPOINTS.iter().any(|endpoint| path.starts_with(endpoint))
}

/// Classify a request. First match wins.
pub fn route(ctx: &RequestContext) -> Route {
    let path = ctx.url.path();

    if ctx.is_navigation && path != "/" {
        return Route::NetworkFirst { tier: TierKind::Pages, cacheable: OK_ONLY };
    }

    if matches!(ctx.destination, Destination::Script | Destination::Style) || is_static_asset_path(path) {
        return Route::CacheFirst { tier: TierKind::Static, cacheable: OK_ONLY };
    }

    if ctx.destination == Destination::Image {
        return Route::CacheFirst { tier: TierKind::Images, cacheable: OK_ONLY };
    }

    if is_image_api_path(path) {
        return Route::CacheFirst { tier: TierKind::Images, cacheable: OK_ONLY };
    }

    if path.starts_with("/api/") {
        return Route::NetworkFirst { tier: TierKind::Api, cacheable: OK_OR_NOT_MODIFIED };
    }

    if ctx.destination == Destination::Font {
        return Route::CacheFirst { tier: TierKind::Font, cacheable: OK_ONLY };
    }

    Route::NetworkOnly
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://app.example").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_navigation_goes_network_first_to_pages() {
        let ctx = RequestContext::navigation(url("/dashboard"));
        assert_eq!(route(&ctx), Route::NetworkFirst { tier: TierKind::Pages, cacheable: OK_ONLY });
    }

    #[test]
    fn test_root_navigation_is_excluded_from_pages() {
        let ctx = RequestContext::navigation(url("/"));
        assert_eq!(route(&ctx), Route::NetworkOnly);
    }

    #[test]
    fn test_hashed_static_assets_go_cache_first() {
        let ctx = RequestContext::subresource(url("/_next/static/chunks/main-abc123.js"), Destination::Other);
        assert_eq!(route(&ctx), Route::CacheFirst { tier: TierKind::Static, cacheable: OK_ONLY });

        let ctx = RequestContext::subresource(url("/styles/site.css"), Destination::Style);
        assert_eq!(route(&ctx), Route::CacheFirst { tier: TierKind::Static, cacheable: OK_ONLY });
    }

    #[test]
    fn test_images_by_destination() {
        let ctx = RequestContext::subresource(url("/images/logo.svg"), Destination::Image);
        assert_eq!(route(&ctx), Route::CacheFirst { tier: TierKind::Images, cacheable: OK_ONLY });
    }

    #[test]
    fn test_image_api_beats_generic_api() {
        let ctx = RequestContext::subresource(url("/api/nationalSign"), Destination::Other);
        assert_eq!(route(&ctx), Route::CacheFirst { tier: TierKind::Images, cacheable: OK_ONLY });
    }

    #[test]
    fn test_api_goes_network_first_with_304() {
        let ctx = RequestContext::subresource(url("/api/cardData"), Destination::Other);
        assert_eq!(route(&ctx), Route::NetworkFirst { tier: TierKind::Api, cacheable: OK_OR_NOT_MODIFIED });
    }

    #[test]
    fn test_fonts_go_to_font_tier() {
        let ctx = RequestContext::subresource(url("/fonts/inter.woff2"), Destination::Font);
        assert_eq!(route(&ctx), Route::CacheFirst { tier: TierKind::Font, cacheable: OK_ONLY });
    }

    #[test]
    fn test_unmatched_is_network_only() {
        let ctx = RequestContext::subresource(url("/metrics"), Destination::Other);
        assert_eq!(route(&ctx), Route::NetworkOnly);
    }
}
