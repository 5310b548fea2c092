//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::router::NEWS_FEED_SUFFIX;
use crate::{GenerationId, RouteRule, RouteTable, Strategy};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the site; relative manifest entries resolve against it.
    ///
    /// Set via SHELLCACHE_SITE_URL environment variable.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Current generation identifier, used as the bucket name.
    ///
    /// Set via SHELLCACHE_GENERATION environment variable. Bumping it on
    /// deploy discards every previously cached entry at activation.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Asset manifest fetched and stored at install. Empty skips pre-population.
    #[serde(default)]
    pub precache: Vec<String>,

    /// Path-suffix routing table; unmatched paths are cache-first.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteRule>,

    /// Path to the SQLite cache database. Unset keeps the cache in memory.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_site_url() -> String {
    "http://localhost:8000/".into()
}

fn default_generation() -> String {
    "noticias-shell-v3".into()
}

fn default_routes() -> Vec<RouteRule> {
    vec![RouteRule::new(NEWS_FEED_SUFFIX, Strategy::NetworkFirst)]
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            generation: default_generation(),
            precache: Vec::new(),
            routes: default_routes(),
            db_path: None,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed site URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the URL does not parse.
    pub fn site_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.site_url)
            .map_err(|e| ConfigError::Invalid { field: "site_url".into(), reason: e.to_string() })
    }

    /// Generation identifier as a validated type.
    pub fn generation_id(&self) -> Result<GenerationId, ConfigError> {
        GenerationId::new(self.generation.clone())
            .map_err(|e| ConfigError::Invalid { field: "generation".into(), reason: e.to_string() })
    }

    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(self.routes.clone())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
