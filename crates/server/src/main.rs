//! shellcache server entry point.
//!
//! Boots the worker (install, then activate) and serves lifecycle and fetch
//! events as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

/// Client id of the stdio peer.
const STDIO_CLIENT: &str = "stdio";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let state = state::AppState::from_config(&config).await?;

    state.worker.attach_client(STDIO_CLIENT).await;
    match state.worker.start().await {
        Ok((installed, _)) => tracing::info!(
            generation = %installed.generation,
            precached = installed.precached,
            "worker active"
        ),
        Err(e) => tracing::error!(error = %e, "worker failed to start; requests will pass through to the network"),
    }

    tracing::info!(site = %state.site_url, "Starting shellcache server on stdio transport");

    let handler = handler::ShellCacheServer::new(state.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    state.worker.detach_client(STDIO_CLIENT).await;

    Ok(())
}
