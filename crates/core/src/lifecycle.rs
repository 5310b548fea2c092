//! Cache lifecycle: install and activate for one deployment generation.
//!
//! ### Install
//! - Open (create) the bucket named by the generation identifier.
//! - If an asset manifest is configured, fetch every entry concurrently and
//!   store them only when all succeed with a 2xx status.
//! - Ask for waiting to be skipped so activation follows immediately.
//!
//! ### Activate
//! - Delete every bucket whose name differs from the current generation.
//! - Claim all attached clients.

use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use url::Url;

use crate::cache::{Bucket, CacheStorage};
use crate::worker::Clients;
use crate::{Error, Fetcher, SiteRequest, StoredResponse};

/// Name of the bucket that is current for this deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty or blank identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidInput("generation identifier must not be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a completed install step.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallOutcome {
    pub generation: GenerationId,
    /// Number of manifest entries stored.
    pub precached: usize,
    /// Activate right away instead of waiting for old clients to close.
    pub skip_waiting: bool,
}

/// Result of a completed activate step.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateOutcome {
    pub generation: GenerationId,
    /// Stale buckets removed, in enumeration order.
    pub deleted: Vec<String>,
    /// Clients now controlled by this generation.
    pub claimed: usize,
}

/// Creates the current bucket and garbage-collects the others.
pub struct LifecycleManager {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<Clients>,
    generation: GenerationId,
    manifest: Vec<Url>,
}

impl LifecycleManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>, clients: Arc<Clients>, generation: GenerationId,
    ) -> Self {
        Self { storage, fetcher, clients, generation, manifest: Vec::new() }
    }

    /// Pre-populate these URLs at install time.
    pub fn with_manifest(mut self, manifest: Vec<Url>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn generation(&self) -> &GenerationId {
        &self.generation
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Run the install step.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if any manifest entry cannot be
    /// fetched or answers with a non-2xx status, or the storage error if the
    /// batch write fails. Nothing from the manifest is stored in either case.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        let bucket = Bucket::open(self.storage.clone(), self.generation.as_str()).await?;

        let precached = if self.manifest.is_empty() { 0 } else { self.precache(&bucket).await? };

        tracing::info!(generation = %self.generation, precached, "install complete");

        Ok(InstallOutcome { generation: self.generation.clone(), precached, skip_waiting: true })
    }

    async fn precache(&self, bucket: &Bucket) -> Result<usize, Error> {
        let mut set = JoinSet::new();
        for (idx, url) in self.manifest.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let request = SiteRequest::get(url.clone());
            set.spawn(async move {
                let result = fetcher.fetch(&request).await;
                (idx, request, result)
            });
        }

        let mut fetched: Vec<Option<(SiteRequest, StoredResponse)>> = (0..self.manifest.len()).map(|_| None).collect();

        while let Some(joined) = set.join_next().await {
            let (idx, request, result) = joined.map_err(|e| Error::Background(e.to_string()))?;
            let response = result.map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url)))?;
            if !response.is_ok() {
                return Err(Error::InstallFailed(format!(
                    "{} answered with status {}",
                    request.url, response.status
                )));
            }
            fetched[idx] = Some((request, response));
        }

        let pairs: Vec<(SiteRequest, StoredResponse)> = fetched.into_iter().flatten().collect();
        bucket.put_all(&pairs).await?;
        tracing::debug!(bucket = bucket.name(), entries = pairs.len(), "precached manifest");

        Ok(pairs.len())
    }

    /// Run the activate step.
    ///
    /// Every stale bucket is attempted even if an earlier delete fails.
    ///
    /// # Errors
    ///
    /// Returns the first delete error after the sweep; clients are not
    /// claimed in that case.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        self.storage.open(self.generation.as_str()).await?;
        let names = self.storage.keys().await?;

        let mut deleted = Vec::new();
        let mut first_err = None;
        for name in names.into_iter().filter(|n| n != self.generation.as_str()) {
            match self.storage.delete(&name).await {
                Ok(_) => {
                    tracing::info!(bucket = %name, "deleted stale bucket");
                    deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(bucket = %name, error = %e, "failed to delete stale bucket");
                    first_err.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }

        let claimed = self.clients.claim(&self.generation).await;
        tracing::info!(generation = %self.generation, deleted = deleted.len(), claimed, "activate complete");

        Ok(ActivateOutcome { generation: self.generation.clone(), deleted, claimed })
    }
}
