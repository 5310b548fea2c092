//! In-memory cache storage.
//!
//! Uses a Vec of buckets behind a tokio RwLock so bucket names keep their
//! creation order. Entries are lost when the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStorage, EntryMeta, RequestKey};
use crate::{Error, StoredResponse};

struct MemoryEntry {
    meta: EntryMeta,
    response: StoredResponse,
}

impl MemoryEntry {
    fn new(key: &RequestKey, response: &StoredResponse) -> Self {
        let meta = EntryMeta {
            method: key.method.clone(),
            url: key.url.clone(),
            status: response.status,
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        Self { meta, response: response.clone() }
    }
}

struct MemoryBucket {
    name: String,
    entries: HashMap<String, MemoryEntry>,
}

/// Ephemeral cache storage.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    buckets: Arc<RwLock<Vec<MemoryBucket>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage").finish_non_exhaustive()
    }
}

fn ensure<'a>(buckets: &'a mut Vec<MemoryBucket>, name: &str) -> &'a mut MemoryBucket {
    let idx = match buckets.iter().position(|b| b.name == name) {
        Some(idx) => idx,
        None => {
            buckets.push(MemoryBucket { name: name.to_string(), entries: HashMap::new() });
            buckets.len() - 1
        }
    };
    &mut buckets[idx]
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        ensure(&mut buckets, name);
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.buckets.read().await.iter().any(|b| b.name == name))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.buckets.read().await.iter().map(|b| b.name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|b| b.name != name);
        Ok(buckets.len() != before)
    }

    async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .find(|b| b.name == bucket)
            .and_then(|b| b.entries.get(&key.hash))
            .map(|e| e.response.clone()))
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        ensure(&mut buckets, bucket)
            .entries
            .insert(key.hash.clone(), MemoryEntry::new(key, response));
        Ok(())
    }

    async fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        let target = ensure(&mut buckets, bucket);
        for (key, response) in entries {
            target.entries.insert(key.hash.clone(), MemoryEntry::new(key, response));
        }
        Ok(())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        let buckets = self.buckets.read().await;
        let mut metas: Vec<EntryMeta> = buckets
            .iter()
            .find(|b| b.name == bucket)
            .map(|b| b.entries.values().map(|e| e.meta.clone()).collect())
            .unwrap_or_default();
        metas.sort_by(|a, b| a.stored_at.cmp(&b.stored_at).then_with(|| a.url.cmp(&b.url)));
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SiteRequest;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        let url = Url::parse("https://example.com/").unwrap().join(path).unwrap();
        RequestKey::for_request(&SiteRequest::get(url))
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let storage = MemoryStorage::new();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        storage.open("b").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_put_creates_bucket() {
        let storage = MemoryStorage::new();
        let resp = StoredResponse::new("https://example.com/", 200, "ok");
        storage.put("v2", &key("/"), &resp).await.unwrap();
        assert!(storage.has("v2").await.unwrap());
        assert_eq!(storage.get("v2", &key("/")).await.unwrap(), Some(resp));
    }

    #[tokio::test]
    async fn test_get_missing_bucket_is_miss() {
        let storage = MemoryStorage::new();
        assert!(storage.get("nope", &key("/")).await.unwrap().is_none());
        assert!(!storage.has("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let storage = MemoryStorage::new();
        storage
            .put("v1", &key("/index.html"), &StoredResponse::new("u", 200, "x"))
            .await
            .unwrap();
        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert!(storage.get("v1", &key("/index.html")).await.unwrap().is_none());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let storage = MemoryStorage::new();
        storage
            .put("v1", &key("/noticias.json"), &StoredResponse::new("u", 200, r#"{"a":0}"#))
            .await
            .unwrap();
        storage
            .put("v1", &key("/noticias.json"), &StoredResponse::new("u", 200, r#"{"a":1}"#))
            .await
            .unwrap();
        let got = storage.get("v1", &key("/noticias.json")).await.unwrap().unwrap();
        assert_eq!(got.text(), r#"{"a":1}"#);
        assert_eq!(storage.entries("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_all_stores_batch() {
        let storage = MemoryStorage::new();
        let batch = vec![
            (key("./"), StoredResponse::new("https://example.com/", 200, "shell")),
            (key("./index.html"), StoredResponse::new("https://example.com/index.html", 200, "shell")),
        ];
        storage.put_all("v1", &batch).await.unwrap();
        assert_eq!(storage.entries("v1").await.unwrap().len(), 2);
    }
}
