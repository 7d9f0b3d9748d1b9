//! MCP server binary entry point.

use anyhow::{Context, Result};
use oracle_mcp_server::{
    config::ServerConfig,
    database::create_driver,
    protocol::McpServerBuilder,
    server::{McpHandler, ServerStateBuilder},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = ServerConfig::from_env().context("Invalid Oracle configuration")?;
    for warning in config.warnings() {
        warn!("Configuration warning: {}", warning);
    }
    info!(
        dsn = %config.oracle.dsn(),
        username = %config.oracle.username,
        max_rows = config.oracle.max_rows,
        rate_limit = config.security.rate_limit_max_requests,
        rate_window_secs = config.security.rate_limit_window_secs,
        "Configuration loaded"
    );

    let driver = create_driver(&config.oracle).context("Failed to create Oracle driver")?;
    match driver.ping().await {
        Ok(()) => info!(driver = driver.name(), "Oracle connection verified"),
        Err(e) => warn!(
            driver = driver.name(),
            "Oracle not reachable yet, tools will report errors until it is: {}", e
        ),
    }

    let state = Arc::new(
        ServerStateBuilder::new()
            .config(config)
            .driver(driver)
            .build()?,
    );

    info!(
        session_id = %state.session_id,
        tools = state.tools.len(),
        "Server state initialized"
    );

    let server = McpServerBuilder::new()
        .handler(McpHandler::new(state))
        .name(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .with_tools()
        .with_resources()
        .build()?;

    info!("MCP server ready, waiting for requests on stdio");

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oracle_mcp_server=info,warn"));

    // stdout carries the protocol; logs go to stderr as JSON.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
