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

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `generation` is blank, and
    /// `ConfigError::Invalid` if:
    /// - `site_url` does not parse or is not http(s)
    /// - a route has an empty suffix
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "generation".into(),
                hint: "Set SHELLCACHE_GENERATION to the bucket name of this deploy".into(),
            });
        }

        let site = self.site_url()?;
        if !matches!(site.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "site_url".into(),
                reason: format!("unsupported scheme: {}", site.scheme()),
            });
        }

        if let Some(idx) = self.routes.iter().position(|r| r.suffix.is_empty()) {
            return Err(ConfigError::Invalid {
                field: format!("routes[{idx}].suffix"),
                reason: "must not be empty".into(),
            });
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

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.db_path.is_none() {
            tracing::warn!("db_path is not set; cached entries will not survive a restart");
        }

        Ok(())
    }
}
