//! MCP Server implementation and lifecycle management.
//!
//! [`McpServer`] owns what every transport shares: the configuration and the
//! tool registry, which the registration policy fills completely before any
//! transport starts. Each client connection gets its own
//! [`ProtocolSession`]; in pipe mode that session is bound to rmcp through
//! [`SessionHandler`].

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, model::*, service::RequestContext,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use super::config::{Config, ServerConfig};
use super::error::{Error, Result};
use super::session::{ProtocolSession, SessionError};
use crate::domains::tools::{ToolContext, ToolRegistry, build_registry};

/// Shared server state: configuration plus the immutable tool registry.
#[derive(Debug, Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Identity reported to clients.
    identity: Arc<ServerConfig>,

    /// Registry shared by every session.
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Create the server and build its registry.
    ///
    /// Fails with a configuration error if two enabled tool groups declare
    /// the same tool name.
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        config.chains.warn_missing_credentials(&config.features);

        let ctx = ToolContext::new(config.clone())
            .map(Arc::new)
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;
        let registry = build_registry(&ctx)?;

        Ok(Self::with_registry(config, registry))
    }

    /// Create a server around an already built registry.
    pub fn with_registry(config: Arc<Config>, registry: ToolRegistry) -> Self {
        Self {
            identity: Arc::new(config.server.clone()),
            config,
            registry: Arc::new(registry),
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the shared tool registry.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Create a session without channels (pipe mode).
    pub fn session(&self) -> Arc<ProtocolSession> {
        Arc::new(ProtocolSession::new(&self.registry, self.identity.clone()))
    }

    /// Create a streaming session pushing responses into `outbound`.
    #[cfg(feature = "sse")]
    pub fn streaming_session(
        &self,
        outbound: tokio::sync::mpsc::Sender<super::protocol::JsonRpcResponse>,
    ) -> Arc<ProtocolSession> {
        ProtocolSession::streaming(&self.registry, self.identity.clone(), outbound)
    }
}

/// rmcp binding of one [`ProtocolSession`].
#[derive(Debug, Clone)]
pub struct SessionHandler {
    session: Arc<ProtocolSession>,
}

impl SessionHandler {
    pub fn new(session: Arc<ProtocolSession>) -> Self {
        Self { session }
    }
}

/// Map a session error onto the SDK error type.
fn to_mcp_error(err: SessionError) -> McpError {
    match err {
        SessionError::Tool(tool_err) => {
            McpError::invalid_params(tool_err.to_string(), Some(tool_err.payload()))
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

impl ServerHandler for SessionHandler {
    fn get_info(&self) -> ServerInfo {
        let identity = self.session.server();
        ServerInfo {
            server_info: Implementation {
                name: identity.name.clone(),
                version: identity.version.clone(),
                ..Implementation::from_build_env()
            },
            instructions: Some(self.session.instructions()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        info!("Listing tools");
        let tools = self.session.list_tools().await.map_err(to_mcp_error)?;
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, request, _context), fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let arguments = request
            .arguments
            .map(Value::Object)
            .unwrap_or_else(|| Value::Object(Default::default()));
        self.session
            .call_tool(&request.name, arguments)
            .await
            .map_err(to_mcp_error)
    }
}
