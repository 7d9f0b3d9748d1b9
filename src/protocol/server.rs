//! MCP server with lifecycle management.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Server created but not initialized.
    Created,
    /// Initialize request received, awaiting initialized notification.
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

impl ServerState {
    /// Methods a client may call before `initialize`.
    fn accepts(&self, method: &str) -> bool {
        !matches!(self, Self::Created) || matches!(method, "initialize" | "ping")
    }
}

/// MCP Server.
pub struct McpServer<H: Handler> {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    handler: Arc<H>,
    state: RwLock<ServerState>,
}

impl<H: Handler> McpServer<H> {
    pub fn new(handler: H, info: ServerInfo, capabilities: ServerCapabilities) -> Self {
        Self {
            info,
            capabilities,
            handler: Arc::new(handler),
            state: RwLock::new(ServerState::Created),
        }
    }

    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Run the server on stdin/stdout until EOF or `shutdown`.
    #[instrument(skip(self), fields(server = %self.info.name))]
    pub async fn run(self) -> Result<()> {
        let transport = StdioTransport::stdio();
        self.run_with_transport(&transport).await
    }

    /// Run the server with a custom transport.
    pub async fn run_with_transport<T: Transport>(&self, transport: &T) -> Result<()> {
        info!(
            "Starting MCP server: {} v{}",
            self.info.name, self.info.version
        );

        let dispatcher = Dispatcher::new(Arc::clone(&self.handler));

        loop {
            let message = match transport.read_message().await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(ProtocolError::ParseError)) => {
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    if let Err(e) = transport.write_response(&response).await {
                        error!("Failed to send error response: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break;
                }
            };

            let request = match message {
                Message::Request(request) => request,
                Message::Response(response) => {
                    warn!(id = ?response.id, "Unexpected response received");
                    continue;
                }
            };

            let is_notification = request.is_notification();
            let method = request.method.clone();

            let response = if self.state().await.accepts(&method) {
                self.update_state_for_method(&method).await;
                dispatcher.dispatch(request).await
            } else {
                warn!(method = %method, "Request before initialize");
                let err = ProtocolError::NotInitialized;
                JsonRpcResponse::error(request.id, JsonRpcError::new(err.code(), err.to_string()))
            };

            if !is_notification {
                if let Err(e) = transport.write_response(&response).await {
                    error!("Failed to send response: {}", e);
                }
            }

            if method == "shutdown" {
                info!("Shutdown request received");
                break;
            }
        }

        *self.state.write().await = ServerState::Stopped;
        info!("Server stopped");
        Ok(())
    }

    async fn update_state_for_method(&self, method: &str) {
        let mut state = self.state.write().await;
        match method {
            "initialize" if *state == ServerState::Created => {
                *state = ServerState::Initializing;
            }
            "initialized" | "notifications/initialized" if *state == ServerState::Initializing => {
                *state = ServerState::Running;
                info!("Server initialized and running");
            }
            "shutdown" => {
                *state = ServerState::ShuttingDown;
            }
            _ => {}
        }
    }
}

/// Builder for MCP Server.
pub struct McpServerBuilder<H: Handler> {
    handler: Option<H>,
    name: String,
    version: String,
    capabilities: ServerCapabilities,
}

impl<H: Handler> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            capabilities: ServerCapabilities::default(),
        }
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.capabilities.tools = Some(ToolsCapability {
            list_changed: Some(false),
        });
        self
    }

    pub fn with_resources(mut self) -> Self {
        self.capabilities.resources = Some(ResourcesCapability {
            subscribe: Some(false),
            list_changed: Some(false),
        });
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            ServerInfo {
                name: self.name,
                version: self.version,
            },
            self.capabilities,
        ))
    }
}

impl<H: Handler> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolResult;
    use crate::protocol::transport::LineTransport;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct TestHandler;

    #[async_trait]
    impl Handler for TestHandler {
        async fn initialize(&self, _params: InitializeParams) -> ProtocolResult<InitializeResult> {
            Ok(InitializeResult {
                protocol_version: MCP_VERSION.into(),
                capabilities: ServerCapabilities::default(),
                server_info: ServerInfo {
                    name: "test".into(),
                    version: "1.0".into(),
                },
                instructions: None,
            })
        }

        async fn initialized(&self) -> ProtocolResult<()> {
            Ok(())
        }

        async fn shutdown(&self) -> ProtocolResult<()> {
            Ok(())
        }

        async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
            Ok(ListToolsResult {
                tools: vec![],
                next_cursor: None,
            })
        }

        async fn call_tool(&self, _params: CallToolParams) -> ProtocolResult<CallToolResult> {
            Ok(CallToolResult::text("test"))
        }
    }

    fn server() -> McpServer<TestHandler> {
        McpServerBuilder::new()
            .handler(TestHandler)
            .name("test-server")
            .version("0.1.0")
            .with_tools()
            .with_resources()
            .build()
            .unwrap()
    }

    /// Feed `lines` to a fresh server and return the parsed responses.
    async fn exchange(server: &McpServer<TestHandler>, lines: &[Value]) -> Vec<Value> {
        let input: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let transport = LineTransport::new(input.as_bytes(), Vec::<u8>::new());
        server.run_with_transport(&transport).await.unwrap();

        let (_, output) = transport.into_parts();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn initialize(id: i64) -> Value {
        json!({
            "jsonrpc": "2.0", "id": id, "method": "initialize",
            "params": {"protocolVersion": MCP_VERSION, "capabilities": {}, "clientInfo": {"name": "c", "version": "1"}}
        })
    }

    #[test]
    fn test_server_builder() {
        let server = server();
        assert_eq!(server.info().name, "test-server");
        assert_eq!(server.info().version, "0.1.0");
        assert!(server.capabilities().tools.is_some());
        assert!(server.capabilities().resources.is_some());
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let server = server();
        assert_eq!(server.state().await, ServerState::Created);

        let responses = exchange(
            &server,
            &[
                initialize(1),
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
                json!({"jsonrpc": "2.0", "id": 3, "method": "shutdown"}),
                json!({"jsonrpc": "2.0", "id": 4, "method": "ping"}),
            ],
        )
        .await;

        // The notification gets no reply and nothing after shutdown is read.
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"]["protocolVersion"], MCP_VERSION);
        assert_eq!(responses[1]["result"]["tools"], json!([]));
        assert_eq!(responses[2]["id"], 3);
        assert_eq!(server.state().await, ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_rejects_calls_before_initialize() {
        let server = server();
        let responses = exchange(
            &server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
            ],
        )
        .await;

        assert_eq!(responses[0]["error"]["code"], -32002);
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error_keeps_serving() {
        let server = server();
        let input = format!("{{broken\n{}\n", initialize(1));
        let transport = LineTransport::new(input.as_bytes(), Vec::<u8>::new());
        server.run_with_transport(&transport).await.unwrap();

        let (_, output) = transport.into_parts();
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[1]["id"], 1);
    }
}
