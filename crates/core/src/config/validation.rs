//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `base_url` is not an absolute http(s) URL
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `network_timeout_ms` is below 100ms or above `timeout_ms`
    /// - `cache_version` or `user_agent` is empty
    /// - health poll settings are inconsistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin()?;
        match origin.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ConfigError::Invalid {
                    field: "base_url".into(),
                    reason: format!("unsupported scheme: {scheme}"),
                });
            }
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.network_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "network_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.network_timeout_ms > self.timeout_ms {
            return Err(ConfigError::Invalid {
                field: "network_timeout_ms".into(),
                reason: "must not exceed timeout_ms".into(),
            });
        }

        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }
        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.health_poll_interval_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "health_poll_interval_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.health_poll_deadline_ms < self.health_poll_interval_ms {
            return Err(ConfigError::Invalid {
                field: "health_poll_deadline_ms".into(),
                reason: "must be at least the poll interval".into(),
            });
        }

        Ok(())
    }
}
