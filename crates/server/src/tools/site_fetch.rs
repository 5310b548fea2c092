//! site_fetch tool implementation.
//!
//! Delivers a fetch event to the worker and reports which path answered it.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::resolve;
use shellcache_core::{Error, ResponseSource, SiteRequest, Strategy};

use crate::state::AppState;
use crate::tools::json_result;

/// Input parameters for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchParams {
    /// Absolute URL, or a path relative to the site URL (e.g. "./index.html").
    pub url: String,

    /// HTTP method (default: GET). Only GET requests use the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Wait for the background cache write before answering.
    #[serde(default)]
    pub wait_for_store: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// HTTP status of the returned response.
    pub status: u16,
    /// Where the response came from: network, cache or passthrough.
    pub source: ResponseSource,
    /// Strategy applied, absent for passthrough requests.
    pub strategy: Option<Strategy>,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Response body decoded as UTF-8.
    pub body: String,
    /// Whether a copy is being written to the cache.
    pub store_scheduled: bool,
}

/// Implementation of the site_fetch tool.
pub async fn fetch_impl(state: &AppState, params: SiteFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let url = resolve(&state.site_url, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = SiteRequest::new(params.method.trim(), url);

    let mut routed = state.worker.fetch(&request).await?;
    let store_scheduled = routed.store.is_some();
    if params.wait_for_store {
        routed.stored().await?;
    }

    let output = SiteFetchOutput {
        url: request.url.to_string(),
        status: routed.response.status,
        source: routed.source,
        strategy: routed.strategy,
        content_type: routed.response.content_type().map(str::to_string),
        body: routed.response.text(),
        store_scheduled,
    };

    json_result(&output)
}
