//! Test doubles for the storage and network seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use crate::cache::{CacheStorage, EntryMeta, MemoryStorage, RequestKey};
use crate::{Error, Fetcher, SiteRequest, StoredResponse};

enum Script {
    Respond { status: u16, body: String },
    Fail(String),
}

/// Fetcher answering from a per-URL script and counting calls.
///
/// Unscripted URLs fail as if the host were unreachable.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond(&self, url: Url, status: u16, body: &str) {
        self.scripts
            .lock()
            .await
            .insert(url.to_string(), Script::Respond { status, body: body.to_string() });
    }

    pub async fn fail(&self, url: Url, message: &str) {
        self.scripts
            .lock()
            .await
            .insert(url.to_string(), Script::Fail(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &SiteRequest) -> Result<StoredResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().await.get(request.url.as_str()) {
            Some(Script::Respond { status, body }) => {
                Ok(StoredResponse::new(request.url.as_str(), *status, body.clone()).with_header("x-test", "1"))
            }
            Some(Script::Fail(message)) => Err(Error::Network(message.clone())),
            None => Err(Error::Network(format!("no route to {}", request.url))),
        }
    }
}

fn closed() -> Error {
    Error::Database(tokio_rusqlite::Error::ConnectionClosed)
}

/// Storage whose every operation fails.
pub struct FailingStorage;

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn open(&self, _name: &str) -> Result<(), Error> {
        Err(closed())
    }

    async fn has(&self, _name: &str) -> Result<bool, Error> {
        Err(closed())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Err(closed())
    }

    async fn delete(&self, _name: &str) -> Result<bool, Error> {
        Err(closed())
    }

    async fn get(&self, _bucket: &str, _key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        Err(closed())
    }

    async fn put(&self, _bucket: &str, _key: &RequestKey, _response: &StoredResponse) -> Result<(), Error> {
        Err(closed())
    }

    async fn put_all(&self, _bucket: &str, _entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        Err(closed())
    }

    async fn entries(&self, _bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        Err(closed())
    }
}

/// In-memory storage that refuses to delete one bucket.
pub struct StuckBucket {
    pub inner: MemoryStorage,
    pub stuck: String,
}

#[async_trait]
impl CacheStorage for StuckBucket {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.inner.has(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if name == self.stuck {
            return Err(closed());
        }
        self.inner.delete(name).await
    }

    async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        self.inner.get(bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        self.inner.put(bucket, key, response).await
    }

    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        self.inner.put_all(bucket, entries).await
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        self.inner.entries(bucket).await
    }
}

/// In-memory storage whose writes never complete.
#[derive(Default)]
pub struct HangingPut {
    pub inner: MemoryStorage,
}

#[async_trait]
impl CacheStorage for HangingPut {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.inner.has(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete(name).await
    }

    async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        self.inner.get(bucket, key).await
    }

    async fn put(&self, _bucket: &str, _key: &RequestKey, _response: &StoredResponse) -> Result<(), Error> {
        std::future::pending().await
    }

    async fn put_all(&self, _bucket: &str, _entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        std::future::pending().await
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        self.inner.entries(bucket).await
    }
}
