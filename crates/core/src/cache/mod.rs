//! Named cache buckets holding request/response pairs.
//!
//! This module provides the storage seam used by the lifecycle manager and
//! the fetch router. It supports:
//!
//! - A `CacheStorage` trait modelled on a browser cache store
//!   (open / keys / delete / get / put)
//! - An in-memory backend for tests and ephemeral runs
//! - A SQLite backend via tokio-rusqlite that survives restarts
//! - Content-addressed request keys using SHA-256

pub mod buckets;
pub mod connection;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::Error;
use crate::{SiteRequest, StoredResponse};

pub use connection::CacheDb;
pub use hash::RequestKey;
pub use memory::MemoryStorage;

/// Listing row for one stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub stored_at: String,
}

/// Cache storage interface.
///
/// Bucket names are returned in creation order. `put` creates the bucket
/// if it does not exist yet; `get` on a missing bucket is a miss.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if absent.
    async fn open(&self, name: &str) -> Result<(), Error>;

    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// All bucket names.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a bucket and its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error>;

    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error>;

    /// Store every pair or none of them.
    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error>;

    /// Entries of a bucket, oldest first.
    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error>;
}

/// Handle on one opened bucket.
#[derive(Clone)]
pub struct Bucket {
    name: String,
    storage: Arc<dyn CacheStorage>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket").field("name", &self.name).finish()
    }
}

impl Bucket {
    /// Open (creating if absent) the bucket called `name`.
    pub async fn open(storage: Arc<dyn CacheStorage>, name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        storage.open(&name).await?;
        Ok(Self { name, storage })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, request: &SiteRequest) -> Result<Option<StoredResponse>, Error> {
        self.storage.get(&self.name, &RequestKey::for_request(request)).await
    }

    pub async fn put(&self, request: &SiteRequest, response: &StoredResponse) -> Result<(), Error> {
        self.storage
            .put(&self.name, &RequestKey::for_request(request), response)
            .await
    }

    /// Store a batch atomically.
    pub async fn put_all(&self, pairs: &[(SiteRequest, StoredResponse)]) -> Result<(), Error> {
        let entries: Vec<(RequestKey, StoredResponse)> = pairs
            .iter()
            .map(|(request, response)| (RequestKey::for_request(request), response.clone()))
            .collect();
        self.storage.put_all(&self.name, &entries).await
    }

    pub async fn entries(&self) -> Result<Vec<EntryMeta>, Error> {
        self.storage.entries(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_bucket_open_creates() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let bucket = Bucket::open(storage.clone(), "shell-v1").await.unwrap();
        assert_eq!(bucket.name(), "shell-v1");
        assert!(storage.has("shell-v1").await.unwrap());
        assert!(bucket.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bucket_put_get() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let bucket = Bucket::open(storage, "shell-v1").await.unwrap();
        let request = SiteRequest::get(Url::parse("https://example.com/index.html").unwrap());
        let response = StoredResponse::new("https://example.com/index.html", 200, "<html></html>");

        bucket.put(&request, &response).await.unwrap();
        assert_eq!(bucket.get(&request).await.unwrap(), Some(response));
    }
}
