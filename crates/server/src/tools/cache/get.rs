//! cache_get tool implementation.
//!
//! Looks a request up in the current generation's bucket without touching the network.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::resolve;
use shellcache_core::{EntryMeta, Error, RequestKey, SiteRequest};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL or path relative to the site URL.
    /// When omitted, the bucket's entries are listed instead.
    #[serde(default)]
    pub url: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub bucket: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Output from the cache_get tool when listing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub bucket: String,
    pub entries: Vec<EntryMeta>,
}

/// Implementation of the cache_get tool.
///
/// Read-only: a purged current bucket stays absent.
pub async fn get_impl(state: &AppState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let storage = state.worker.storage();
    let bucket = state.worker.generation().as_str();
    let present = storage.has(bucket).await?;

    let Some(target) = params.url else {
        let entries = if present { storage.entries(bucket).await? } else { Vec::new() };
        return json_result(&CacheListOutput { bucket: bucket.to_string(), entries });
    };

    let url = resolve(&state.site_url, &target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = SiteRequest::get(url);
    let cached = if present { storage.get(bucket, &RequestKey::for_request(&request)).await? } else { None };
    let response = cached.ok_or_else(|| Error::CacheMiss(request.url.to_string()))?;

    let output = CacheGetOutput {
        bucket: bucket.to_string(),
        url: request.url.to_string(),
        status: response.status,
        content_type: response.content_type().map(str::to_string),
        body: response.text(),
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::site_fetch::{SiteFetchParams, fetch_impl};
    use crate::tools::test_support::{fixed, output, state_with};

    #[tokio::test]
    async fn test_get_impl_missing() {
        let state = state_with(fixed(&[]), "shell-v3").await;
        let params = CacheGetParams { url: Some("noticias.json".to_string()) };

        let err = get_impl(&state, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_impl_found_after_fetch() {
        let state = state_with(fixed(&[("noticias.json", r#"{"a":1}"#)]), "shell-v3").await;
        let fetch = SiteFetchParams { url: "noticias.json".into(), method: "GET".into(), wait_for_store: true };
        fetch_impl(&state, fetch).await.unwrap();

        let result = get_impl(&state, CacheGetParams { url: Some("noticias.json".into()) })
            .await
            .unwrap();
        let out: CacheGetOutput = output(&result);
        assert_eq!(out.bucket, "shell-v3");
        assert_eq!(out.body, r#"{"a":1}"#);
        assert_eq!(out.status, 200);
    }

    #[tokio::test]
    async fn test_get_impl_lists_entries() {
        let state = state_with(fixed(&[("index.html", "<html></html>")]), "shell-v3").await;
        let fetch = SiteFetchParams { url: "index.html".into(), method: "GET".into(), wait_for_store: true };
        fetch_impl(&state, fetch).await.unwrap();

        let result = get_impl(&state, CacheGetParams { url: None }).await.unwrap();
        let out: CacheListOutput = output(&result);
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].url, "https://site.example/index.html");
    }

    #[tokio::test]
    async fn test_get_impl_does_not_recreate_purged_bucket() {
        let state = state_with(fixed(&[]), "shell-v3").await;
        state.worker.storage().delete("shell-v3").await.unwrap();

        let result = get_impl(&state, CacheGetParams { url: None }).await.unwrap();
        let out: CacheListOutput = output(&result);
        assert!(out.entries.is_empty());

        let err = get_impl(&state, CacheGetParams { url: Some("index.html".into()) })
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32001);
        assert!(state.worker.storage().keys().await.unwrap().is_empty());
    }
}
