//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::state::AppState;
use crate::tools::cache::{CacheGetParams, CachePurgeParams, buckets_impl, get_impl, purge_impl};
use crate::tools::site_fetch::{SiteFetchParams, fetch_impl};
use crate::tools::worker::{activate_impl, install_impl, status_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    state: AppState,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler around a booted worker.
    pub fn new(state: AppState) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Deliver a fetch event to the worker.
    ///
    /// Routing depends on the request path: the news feed goes to the network
    /// first, everything else is served from cache when present.
    #[tool(
        description = "Fetch a site resource through the offline cache. Returns the body and whether it came from network or cache."
    )]
    async fn site_fetch(&self, params: Parameters<SiteFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Install the current generation (pre-caching the asset manifest), then activate it.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.state).await
    }

    #[tool(description = "Activate the installed generation: delete every other cache bucket and claim clients.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.state).await
    }

    #[tool(description = "Report the worker generation, lifecycle state, routes, clients and failed background writes.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.state).await
    }

    #[tool(description = "List cache buckets with their entry counts.")]
    async fn cache_buckets(&self) -> Result<CallToolResult, McpError> {
        buckets_impl(&self.state).await
    }

    /// Read from the current bucket without touching the network.
    #[tool(description = "Look up a URL in the current cache bucket, or list the bucket's entries when no URL is given.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state, params.0).await
    }

    #[tool(description = "Delete a cache bucket by name, or every bucket except the current generation's.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.state, params.0).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline cache for a static site. Use site_fetch to request pages; worker_* tools drive the install/activate lifecycle."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
