//! MCP server wiring: shared state, request handler and catalog resources.

pub mod handler;
pub mod resources;
pub mod state;

pub use handler::McpHandler;
pub use state::{ServerState, ServerStateBuilder};
