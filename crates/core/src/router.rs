//! Fetch routing with per-path caching strategies.
//!
//! Each intercepted request is classified by the suffix of its URL path:
//!
//! - **network-first** (default: `noticias.json`): try the network, store a
//!   copy in the background, fall back to the bucket when the network fails.
//! - **cache-first** (everything else): serve from the bucket, fetch and
//!   store only on a miss.
//!
//! Non-`GET` requests skip the bucket entirely.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

use crate::cache::{CacheStorage, RequestKey};
use crate::{Error, Fetcher, GenerationId, SiteRequest, StoredResponse};

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteRule {
    /// Matched against the end of the URL path (query excluded).
    pub suffix: String,
    pub strategy: Strategy,
}

impl RouteRule {
    pub fn new(suffix: impl Into<String>, strategy: Strategy) -> Self {
        Self { suffix: suffix.into(), strategy }
    }
}

/// Ordered path-suffix → strategy table; first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    fallback: Strategy,
}

/// Path of the dynamic news feed that must never be served stale when online.
pub const NEWS_FEED_SUFFIX: &str = "noticias.json";

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![RouteRule::new(NEWS_FEED_SUFFIX, Strategy::NetworkFirst)])
    }
}

impl RouteTable {
    /// Table whose unmatched paths go cache-first.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules, fallback: Strategy::CacheFirst }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn classify(&self, url: &Url) -> Strategy {
        let path = url.path();
        self.rules
            .iter()
            .find(|rule| path.ends_with(&rule.suffix))
            .map_or(self.fallback, |rule| rule.strategy)
    }
}

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Sent to the network without touching the bucket.
    Passthrough,
}

/// A response chosen by the router.
///
/// When the response came from the network and was cacheable, `store`
/// holds the background task writing it into the bucket.
#[derive(Debug)]
pub struct Routed {
    pub response: StoredResponse,
    pub source: ResponseSource,
    pub strategy: Option<Strategy>,
    pub store: Option<JoinHandle<Result<(), Error>>>,
}

impl Routed {
    fn new(response: StoredResponse, source: ResponseSource, strategy: Option<Strategy>) -> Self {
        Self { response, source, strategy, store: None }
    }

    /// Wait for the background store, if any, to finish.
    pub async fn stored(&mut self) -> Result<(), Error> {
        match self.store.take() {
            Some(handle) => handle.await.map_err(|e| Error::Background(e.to_string()))?,
            None => Ok(()),
        }
    }
}

/// Routes intercepted requests for one generation's bucket.
pub struct FetchRouter {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    bucket: String,
    routes: RouteTable,
    store_failures: Arc<AtomicU64>,
}

impl FetchRouter {
    pub fn new(
        storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>, generation: &GenerationId, routes: RouteTable,
    ) -> Self {
        Self {
            storage,
            fetcher,
            bucket: generation.as_str().to_string(),
            routes,
            store_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Number of background stores that have failed so far.
    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }

    /// Handle one intercepted request.
    ///
    /// # Errors
    ///
    /// Returns the network error when no cached fallback exists.
    pub async fn handle(&self, request: &SiteRequest) -> Result<Routed, Error> {
        if !request.is_cacheable() {
            tracing::debug!(method = %request.method, url = %request.url, "passthrough");
            let response = self.fetcher.fetch(request).await?;
            return Ok(Routed::new(response, ResponseSource::Passthrough, None));
        }

        match self.routes.classify(&request.url) {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: &SiteRequest) -> Result<Routed, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "network-first: live response");
                let mut routed = Routed::new(response, ResponseSource::Network, Some(Strategy::NetworkFirst));
                routed.store = Some(self.spawn_store(request, &routed.response));
                Ok(routed)
            }
            Err(err) => {
                let key = RequestKey::for_request(request);
                match self.storage.get(&self.bucket, &key).await {
                    Ok(Some(cached)) => {
                        tracing::debug!(url = %request.url, error = %err, "network-first: serving cached copy");
                        Ok(Routed::new(cached, ResponseSource::Cache, Some(Strategy::NetworkFirst)))
                    }
                    Ok(None) => {
                        tracing::debug!(url = %request.url, error = %err, "network-first: no cached copy");
                        Err(err)
                    }
                    Err(cache_err) => {
                        tracing::warn!(url = %request.url, error = %cache_err, "cache lookup failed");
                        Err(err)
                    }
                }
            }
        }
    }

    async fn cache_first(&self, request: &SiteRequest) -> Result<Routed, Error> {
        let key = RequestKey::for_request(request);
        match self.storage.get(&self.bucket, &key).await {
            Ok(Some(cached)) => {
                tracing::debug!(url = %request.url, "cache-first: hit");
                return Ok(Routed::new(cached, ResponseSource::Cache, Some(Strategy::CacheFirst)));
            }
            Ok(None) => tracing::debug!(url = %request.url, "cache-first: miss"),
            Err(e) => tracing::warn!(url = %request.url, error = %e, "cache lookup failed, treating as miss"),
        }

        // A miss followed by a network failure surfaces the network error.
        let response = self.fetcher.fetch(request).await?;
        let mut routed = Routed::new(response, ResponseSource::Network, Some(Strategy::CacheFirst));
        routed.store = Some(self.spawn_store(request, &routed.response));
        Ok(routed)
    }

    fn spawn_store(&self, request: &SiteRequest, response: &StoredResponse) -> JoinHandle<Result<(), Error>> {
        let storage = self.storage.clone();
        let bucket = self.bucket.clone();
        let key = RequestKey::for_request(request);
        let copy = response.clone();
        let failures = self.store_failures.clone();

        tokio::spawn(async move {
            let result = storage.put(&bucket, &key, &copy).await;
            if let Err(e) = &result {
                failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(bucket = %bucket, url = %key.url, error = %e, "background cache store failed");
            }
            result
        })
    }
}
