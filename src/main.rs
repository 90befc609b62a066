//! mail-graph-mcp-rs: Outlook mailbox MCP server over stdio
//!
//! Exposes an Outlook mailbox as Model Context Protocol tools. Every tool
//! call becomes one or more Microsoft Graph REST requests authenticated with
//! an app-only token from the OAuth2 client-credentials flow.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading and stdio serving
//! - [`config`]: Environment-driven credentials and endpoint settings
//! - [`errors`]: Graph and tool error model
//! - [`auth`]: Process-wide bearer token cache with single-flight refresh
//! - [`graph`]: Authenticated Graph request dispatcher
//! - [`server`]: MCP tool handlers with validation and parameter coercion
//! - [`models`]: Tool input types and their defaults
//! - [`format`]: Plain-text rendering of Graph resources

mod auth;
mod config;
mod errors;
mod format;
mod graph;
mod models;
mod server;

use std::sync::Arc;

use config::ServerConfig;
use graph::GraphClient;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point
///
/// Initializes tracing from environment, loads config, and serves the MCP
/// server over stdio. Missing credentials do not stop startup; tools report
/// them on first use.
///
/// # Example
///
/// ```no_run
/// TENANT_ID=contoso.onmicrosoft.com \
/// CLIENT_ID=00000000-0000-0000-0000-000000000000 \
/// CLIENT_SECRET=secret \
/// cargo run
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(ServerConfig::load_from_env()?);
    for name in config.credentials.missing() {
        warn!(variable = name, "credential not set; tool calls will fail");
    }
    info!(
        graph_base_url = %config.graph_base_url,
        mailbox = %config.mailbox_root(),
        "starting Outlook MCP server"
    );

    let graph = GraphClient::from_config(Arc::clone(&config))?;
    let service = server::GraphMailServer::new(config, graph)
        .serve(stdio())
        .await?;
    service.waiting().await?;
    Ok(())
}
