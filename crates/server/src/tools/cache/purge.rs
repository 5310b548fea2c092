//! cache_purge tool implementation.
//!
//! Deletes a bucket by name, or every bucket except the current one.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::Error;

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete this bucket. May name the current one, which empties the cache.
    pub bucket: Option<String>,

    /// Delete every bucket other than the current generation's.
    #[serde(default)]
    pub stale: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Names of the buckets deleted.
    pub deleted: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(state: &AppState, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.bucket.is_none() && !params.stale {
        return Err(Error::InvalidInput("At least one of bucket or stale must be specified".to_string()).into());
    }

    let storage = state.worker.storage();
    let current = state.worker.generation().as_str();
    let mut deleted = Vec::new();

    if params.stale {
        for name in storage.keys().await?.into_iter().filter(|n| n != current) {
            if storage.delete(&name).await? {
                deleted.push(name);
            }
        }
    }

    if let Some(name) = params.bucket
        && !deleted.contains(&name)
        && storage.delete(&name).await?
    {
        tracing::info!(bucket = %name, "bucket purged");
        deleted.push(name);
    }

    json_result(&CachePurgeOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{fixed, output, state_with};

    #[tokio::test]
    async fn test_purge_named_bucket() {
        let state = state_with(fixed(&[]), "shell-v3").await;
        state.worker.storage().open("shell-v1").await.unwrap();

        let params = CachePurgeParams { bucket: Some("shell-v1".to_string()), stale: false };
        let result = purge_impl(&state, params).await.unwrap();
        let out: CachePurgeOutput = output(&result);
        assert_eq!(out.deleted, vec!["shell-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_missing_bucket() {
        let state = state_with(fixed(&[]), "shell-v3").await;
        let params = CachePurgeParams { bucket: Some("nope".to_string()), stale: false };
        let result = purge_impl(&state, params).await.unwrap();
        let out: CachePurgeOutput = output(&result);
        assert!(out.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_purge_stale_keeps_current() {
        let state = state_with(fixed(&[]), "shell-v3").await;
        state.worker.storage().open("a").await.unwrap();
        state.worker.storage().open("b").await.unwrap();

        let params = CachePurgeParams { bucket: None, stale: true };
        let result = purge_impl(&state, params).await.unwrap();
        let out: CachePurgeOutput = output(&result);
        assert_eq!(out.deleted, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(state.worker.storage().keys().await.unwrap(), vec!["shell-v3".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_no_params() {
        let state = state_with(fixed(&[]), "shell-v3").await;
        let params = CachePurgeParams { bucket: None, stale: false };

        let result = purge_impl(&state, params).await;
        assert!(result.is_err());
    }
}
