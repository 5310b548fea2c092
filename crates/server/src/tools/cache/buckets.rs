//! cache_buckets tool implementation.
//!
//! Lists every bucket with its entry count.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::tools::json_result;

/// One bucket in the listing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BucketSummary {
    pub name: String,
    pub entries: usize,
    /// True for the bucket of the running generation.
    pub current: bool,
}

/// Output from the cache_buckets tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheBucketsOutput {
    pub buckets: Vec<BucketSummary>,
}

/// Implementation of the cache_buckets tool.
pub async fn buckets_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let storage = state.worker.storage();
    let current = state.worker.generation().as_str();

    let mut buckets = Vec::new();
    for name in storage.keys().await? {
        let entries = storage.entries(&name).await?.len();
        buckets.push(BucketSummary { current: name == current, name, entries });
    }

    json_result(&CacheBucketsOutput { buckets })
}
