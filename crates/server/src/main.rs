//! postcache server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use postcache_client::ContentClient;
use postcache_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    match config.require_redis_url() {
        Ok(_) => tracing::info!("redis configured, cache connects on first use"),
        Err(e) => tracing::info!(reason = %e, "using in-process cache"),
    }

    let source = ContentClient::from_app_config(&config)?;
    tracing::info!(upstream = %source.config().base_url, "Starting postcache server on stdio transport");

    let state = Arc::new(state::AppState::new(config, Arc::new(source)));
    let handler = handler::PostcacheServer::new(Arc::clone(&state));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    state.shutdown().await;

    Ok(())
}
