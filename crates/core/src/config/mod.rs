//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CACHESHELL_*)
//! 2. TOML config file (if CACHESHELL_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CACHESHELL_*)
/// 2. TOML config file (if CACHESHELL_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite tier store.
    ///
    /// Set via CACHESHELL_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the application the worker fronts. Every app-relative URL
    /// in the shell manifest and route table is resolved against this.
    ///
    /// Set via CACHESHELL_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Build version string embedded in every tier name.
    ///
    /// Set via CACHESHELL_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via CACHESHELL_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per response.
    ///
    /// Set via CACHESHELL_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Total byte budget across all tiers; None means unbounded.
    ///
    /// Set via CACHESHELL_QUOTA_BYTES environment variable.
    #[serde(default)]
    pub quota_bytes: Option<u64>,

    /// Hard HTTP request timeout in milliseconds.
    ///
    /// Set via CACHESHELL_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Soft network wait for network-first routes, in milliseconds. After
    /// this the strategy falls back to cache while the fetch stays in
    /// flight.
    ///
    /// Set via CACHESHELL_NETWORK_TIMEOUT_MS environment variable.
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    /// Per-endpoint cap for install-time runtime preloading, in
    /// milliseconds.
    ///
    /// Set via CACHESHELL_PRELOAD_TIMEOUT_MS environment variable.
    #[serde(default = "default_preload_timeout_ms")]
    pub preload_timeout_ms: u64,

    /// Interval between health status re-checks, in milliseconds.
    ///
    /// Set via CACHESHELL_HEALTH_POLL_INTERVAL_MS environment variable.
    #[serde(default = "default_health_poll_interval_ms")]
    pub health_poll_interval_ms: u64,

    /// Hard wall-clock deadline for one health status stream, in
    /// milliseconds.
    ///
    /// Set via CACHESHELL_HEALTH_POLL_DEADLINE_MS environment variable.
    #[serde(default = "default_health_poll_deadline_ms")]
    pub health_poll_deadline_ms: u64,

    /// Elapsed time after which status messages stop saying "waiting for
    /// install" and start suggesting the resource may need a request first.
    ///
    /// Set via CACHESHELL_HEALTH_WAITING_THRESHOLD_MS environment variable.
    #[serde(default = "default_health_waiting_threshold_ms")]
    pub health_waiting_threshold_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./cacheshell.sqlite")
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_cache_version() -> String {
    "v1.0.0".into()
}

fn default_user_agent() -> String {
    "cacheshell/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_network_timeout_ms() -> u64 {
    2_000
}

fn default_preload_timeout_ms() -> u64 {
    10_000
}

fn default_health_poll_interval_ms() -> u64 {
    10_000
}

fn default_health_poll_deadline_ms() -> u64 {
    60_000
}

fn default_health_waiting_threshold_ms() -> u64 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            base_url: default_base_url(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            quota_bytes: None,
            timeout_ms: default_timeout_ms(),
            network_timeout_ms: default_network_timeout_ms(),
            preload_timeout_ms: default_preload_timeout_ms(),
            health_poll_interval_ms: default_health_poll_interval_ms(),
            health_poll_deadline_ms: default_health_poll_deadline_ms(),
            health_waiting_threshold_ms: default_health_waiting_threshold_ms(),
        }
    }
}

impl AppConfig {
    /// The app origin as a parsed URL.
    pub fn origin(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid { field: "base_url".into(), reason: e.to_string() })
    }

    /// Hard fetch timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Soft network-first wait as Duration.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    /// Install-time preload cap as Duration.
    pub fn preload_timeout(&self) -> Duration {
        Duration::from_millis(self.preload_timeout_ms)
    }

    /// Health poll interval as Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    /// Health poll deadline as Duration.
    pub fn poll_deadline(&self) -> Duration {
        Duration::from_millis(self.health_poll_deadline_ms)
    }

    /// Message-wording threshold as Duration.
    pub fn waiting_threshold(&self) -> Duration {
        Duration::from_millis(self.health_waiting_threshold_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CACHESHELL_`
    /// 2. TOML file from `CACHESHELL_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CACHESHELL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CACHESHELL_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./cacheshell.sqlite"));
        assert_eq!(config.cache_version, "v1.0.0");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.network_timeout_ms, 2_000);
        assert!(config.quota_bytes.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.network_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.poll_interval(), Duration::from_millis(10_000));
        assert_eq!(config.poll_deadline(), Duration::from_millis(60_000));
    }

    #[test]
    fn test_origin_parses() {
        let config = AppConfig::default();
        let origin = config.origin().unwrap();
        assert_eq!(origin.host_str(), Some("localhost"));
    }
}
