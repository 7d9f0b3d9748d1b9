//! Read-only Oracle MCP server.
//!
//! Exposes SELECT-only query execution and table description as MCP tools.
//! Every query passes the [`SqlValidator`] deny-list and complexity limits,
//! and every tool call is admitted by a per-session [`RateLimiter`], before
//! anything reaches the database.
//!
//! # Example
//!
//! ```no_run
//! use oracle_mcp_server::{
//!     config::ServerConfig,
//!     database::create_driver,
//!     protocol::McpServerBuilder,
//!     server::{McpHandler, ServerStateBuilder},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let driver = create_driver(&config.oracle)?;
//!
//!     let state = Arc::new(
//!         ServerStateBuilder::new()
//!             .config(config)
//!             .driver(driver)
//!             .build()?,
//!     );
//!
//!     let server = McpServerBuilder::new()
//!         .handler(McpHandler::new(state))
//!         .with_tools()
//!         .with_resources()
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod protocol;
pub mod security;
pub mod server;
pub mod tools;

pub use config::{OracleConfig, OracleConfigBuilder, SecurityConfig, ServerConfig};
pub use database::{OracleDriver, OrdsDriver, create_driver};
pub use error::{McpError, Result};
pub use protocol::{McpServer, McpServerBuilder};
pub use security::{RateLimiter, SqlValidator};
pub use server::{McpHandler, ServerState, ServerStateBuilder};
