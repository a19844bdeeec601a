//! Tier configuration: one named cache bucket per request class.
//!
//! Tier names embed the build version, so bumping the version produces a
//! whole new set of tier identities instead of mutating existing ones; the
//! activation sweep reclaims the orphaned old-version tiers. Tier names are
//! the only persisted identifiers, which makes them the version-migration
//! mechanism.

use std::fmt;

/// The request classes that get their own runtime tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    Pages,
    Static,
    Images,
    Api,
    Font,
}

impl TierKind {
    pub const ALL: [TierKind; 5] = [
        TierKind::Pages,
        TierKind::Static,
        TierKind::Images,
        TierKind::Api,
        TierKind::Font,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Pages => "pages",
            TierKind::Static => "static",
            TierKind::Images => "images",
            TierKind::Api => "api",
            TierKind::Font => "font",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expiration and quota policy for one runtime tier.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    /// Versioned tier name, e.g. `pages-runtime-v1.0.3`.
    pub name: String,
    /// Maximum number of unique cache keys kept in the tier.
    pub max_entries: u32,
    /// Entries older than this are evicted. None means keep indefinitely.
    pub max_age_seconds: Option<u64>,
    /// Whether a quota error may purge this whole tier to free space.
    pub purge_on_quota_error: bool,
}

const YEAR_SECONDS: u64 = 365 * 24 * 60 * 60;
const MONTH_SECONDS: u64 = 30 * 24 * 60 * 60;

/// The full tier table for one build version.
///
/// Static assets and fonts are content-hashed, so they are safe to keep for
/// a long time and never worth purging under storage pressure. Pages, images
/// and API responses can always be refetched, so those tiers absorb quota
/// errors by purging.
#[derive(Debug, Clone)]
pub struct TierConfig {
    version: String,
    precache_name: String,
    pages: TierPolicy,
    static_assets: TierPolicy,
    images: TierPolicy,
    api: TierPolicy,
    font: TierPolicy,
}

impl TierConfig {
    pub fn for_version(version: &str) -> Self {
        let runtime = |kind: TierKind| format!("{}-runtime-{}", kind.as_str(), version);
        Self {
            version: version.to_string(),
            precache_name: format!("precache-{version}"),
            pages: TierPolicy {
                name: runtime(TierKind::Pages),
                max_entries: 50,
                max_age_seconds: Some(60 * 60),
                purge_on_quota_error: true,
            },
            static_assets: TierPolicy {
                name: runtime(TierKind::Static),
                max_entries: 50,
                max_age_seconds: Some(YEAR_SECONDS),
                purge_on_quota_error: false,
            },
            images: TierPolicy {
                name: runtime(TierKind::Images),
                max_entries: 50,
                max_age_seconds: Some(MONTH_SECONDS),
                purge_on_quota_error: true,
            },
            api: TierPolicy {
                name: runtime(TierKind::Api),
                max_entries: 50,
                max_age_seconds: Some(5 * 60),
                purge_on_quota_error: true,
            },
            font: TierPolicy {
                name: runtime(TierKind::Font),
                max_entries: 20,
                max_age_seconds: Some(YEAR_SECONDS),
                purge_on_quota_error: false,
            },
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the version-scoped precache tier.
    pub fn precache_name(&self) -> &str {
        &self.precache_name
    }

    pub fn policy(&self, kind: TierKind) -> &TierPolicy {
        match kind {
            TierKind::Pages => &self.pages,
            TierKind::Static => &self.static_assets,
            TierKind::Images => &self.images,
            TierKind::Api => &self.api,
            TierKind::Font => &self.font,
        }
    }

    /// The current version's runtime tier names.
    pub fn runtime_names(&self) -> Vec<&str> {
        TierKind::ALL.iter().map(|k| self.policy(*k).name.as_str()).collect()
    }
}

/// Whether a tier name follows the runtime naming pattern (any version).
pub fn is_runtime_tier_name(name: &str) -> bool {
    name.contains("-runtime-")
}

/// Whether a tier name follows the precache naming pattern (any version).
pub fn is_precache_tier_name(name: &str) -> bool {
    name.starts_with("precache-")
}
