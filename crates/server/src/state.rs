//! Shared state handed to every tool call.

use std::sync::Arc;

use anyhow::Result;
use shellcache_client::{FetchClient, FetchConfig, resolve_manifest};
use shellcache_core::{AppConfig, CacheDb, CacheStorage, MemoryStorage, ServiceWorker};
use url::Url;

/// The running worker and the site it serves.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<ServiceWorker>,
    /// Base URL relative tool inputs resolve against.
    pub site_url: Url,
}

impl AppState {
    /// Build storage, network client and worker from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let storage: Arc<dyn CacheStorage> = match &config.db_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "opening SQLite cache");
                Arc::new(CacheDb::open(path).await?)
            }
            None => Arc::new(MemoryStorage::new()),
        };

        let fetcher = Arc::new(FetchClient::new(FetchConfig::from(config))?);
        let site_url = config.site_url()?;
        let manifest = resolve_manifest(&site_url, &config.precache)?;

        let worker = ServiceWorker::new(storage, fetcher, config.generation_id()?, config.route_table())
            .with_manifest(manifest);

        Ok(Self { worker: Arc::new(worker), site_url })
    }
}
