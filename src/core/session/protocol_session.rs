//! Protocol session - one client's logical connection to the tool registry.
//!
//! A session translates protocol requests into registry invocations and
//! registry results back into protocol responses. Requests on one session
//! are executed strictly one at a time, in arrival order; different sessions
//! run concurrently against the same registry.
//!
//! Pipe mode drives a session through [`ProtocolSession::list_tools`] and
//! [`ProtocolSession::call_tool`] from the rmcp handler. Streaming mode
//! creates it with [`ProtocolSession::streaming`], which adds an inbound
//! queue drained by a worker task and an outbound channel feeding the event
//! stream.

use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rmcp::model::{CallToolResult, Content, Tool};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use super::error::SessionError;
use super::state::{SessionId, SessionState};
use crate::core::config::ServerConfig;
use crate::core::protocol::{
    JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, codes,
};
use crate::domains::tools::{ToolError, ToolRegistry};

/// Capacity of a streaming session's inbound queue.
const INBOUND_CAPACITY: usize = 32;

/// One client connection.
pub struct ProtocolSession {
    id: SessionId,
    registry: Weak<ToolRegistry>,
    server: Arc<ServerConfig>,
    state: watch::Sender<SessionState>,
    /// Serializes request execution within this session.
    turn: tokio::sync::Mutex<()>,
    outbound: Mutex<Option<mpsc::Sender<JsonRpcResponse>>>,
    inbound: Mutex<Option<mpsc::Sender<JsonRpcRequest>>>,
}

impl ProtocolSession {
    /// Create a session with no channels of its own (pipe mode).
    pub fn new(registry: &Arc<ToolRegistry>, server: Arc<ServerConfig>) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            id: SessionId::new(),
            registry: Arc::downgrade(registry),
            server,
            state,
            turn: tokio::sync::Mutex::new(()),
            outbound: Mutex::new(None),
            inbound: Mutex::new(None),
        }
    }

    /// Create a streaming session whose responses are pushed to `outbound`.
    ///
    /// Spawns the worker that drains the inbound queue; must be called from
    /// within a Tokio runtime.
    pub fn streaming(
        registry: &Arc<ToolRegistry>,
        server: Arc<ServerConfig>,
        outbound: mpsc::Sender<JsonRpcResponse>,
    ) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let session = Self::new(registry, server);
        *lock(&session.outbound) = Some(outbound);
        *lock(&session.inbound) = Some(inbound_tx);

        let session = Arc::new(session);
        tokio::spawn(session.clone().run_inbound(inbound_rx));
        session
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Server identity reported on initialization.
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Whether the session accepts requests.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Mark the transport handshake as complete.
    pub fn open(&self) -> bool {
        self.transition(SessionState::Open)
    }

    /// Close the session and release its channels.
    ///
    /// An invocation already running completes; its response is discarded.
    pub fn close(&self) {
        if self.transition(SessionState::Closed) {
            lock(&self.outbound).take();
            lock(&self.inbound).take();
        }
    }

    /// Record a transport failure and close.
    pub fn fail(&self, reason: impl Display) {
        warn!(session = %self.id, "Transport failure: {}", reason);
        self.transition(SessionState::Erroring);
        self.close();
    }

    fn transition(&self, next: SessionState) -> bool {
        let mut from = next;
        let changed = self.state.send_if_modified(|state| {
            from = *state;
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            info!(session = %self.id, "Session {} -> {}", from, next);
        }
        changed
    }

    /// Wait until the handshake completes.
    ///
    /// Returns [`SessionError::Closed`] if the session never opened or has
    /// since closed.
    pub async fn wait_ready(&self) -> Result<(), SessionError> {
        let mut state = self.state.subscribe();
        let settled = *state
            .wait_for(|s| *s != SessionState::Connecting)
            .await
            .map_err(|_| SessionError::Closed(self.id))?;
        match settled {
            SessionState::Open => Ok(()),
            _ => Err(SessionError::Closed(self.id)),
        }
    }

    fn registry(&self) -> Result<Arc<ToolRegistry>, SessionError> {
        self.registry
            .upgrade()
            .ok_or(SessionError::RegistryUnavailable)
    }

    /// Text sent to clients on initialization.
    pub fn instructions(&self) -> String {
        let count = self.registry().map(|r| r.len()).unwrap_or(0);
        format!(
            "{} exposes {} blockchain tools. Call tools/list to see which chains are enabled.",
            self.server.name, count
        )
    }

    // ========================================================================
    // Tool operations
    // ========================================================================

    /// List the registry's tools.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, SessionError> {
        self.wait_ready().await?;
        Ok(self.registry()?.tools())
    }

    /// Call a tool.
    ///
    /// Unknown tools and invalid input are returned as errors. A failing
    /// handler produces an `isError` tool result carrying the structured
    /// error payload, so the client sees the original cause.
    #[instrument(skip(self, input), fields(session = %self.id))]
    pub async fn call_tool(
        &self,
        name: &str,
        input: Value,
    ) -> Result<CallToolResult, SessionError> {
        self.wait_ready().await?;
        let _turn = self.turn.lock().await;
        if !self.is_open() {
            return Err(SessionError::Closed(self.id));
        }

        let registry = self.registry()?;
        match registry.invoke(name, input).await {
            Ok(value) => Ok(CallToolResult::success(vec![Content::text(pretty(&value))])),
            Err(err @ ToolError::ExecutionFailed { .. }) => {
                warn!("{}", err);
                Ok(CallToolResult::error(vec![Content::text(pretty(&err.payload()))]))
            }
            Err(err) => Err(err.into()),
        }
    }

    // ========================================================================
    // JSON-RPC handling (streaming transport)
    // ========================================================================

    /// Process one JSON-RPC message. Notifications yield no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::invalid_request(request.id));
        }

        debug!(session = %self.id, "Processing {} request", request.method);
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(request.id, self.initialize_result()),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request).await,
            "tools/call" => self.handle_tools_call(request).await,
            _ => {
                warn!("Unknown method: {}", request.method);
                JsonRpcResponse::method_not_found(request.id)
            }
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.server.name,
                "version": self.server.version
            },
            "instructions": self.instructions()
        })
    }

    async fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match self.list_tools().await {
            Ok(tools) => JsonRpcResponse::success(request.id, json!({ "tools": tools })),
            Err(e) => error_response(request.id, e),
        }
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params = match request.params {
            Some(p) => p,
            None => return JsonRpcResponse::invalid_params(request.id, "Missing params"),
        };

        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_string(),
            None => return JsonRpcResponse::invalid_params(request.id, "Missing tool name"),
        };

        let arguments = params
            .get("arguments")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| json!({}));

        match self.call_tool(&name, arguments).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(request.id, value),
                Err(e) => JsonRpcResponse::internal_error(request.id, e.to_string()),
            },
            Err(e) => error_response(request.id, e),
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => info!(session = %self.id, "Client initialized"),
            method => debug!(session = %self.id, "Received notification: {}", method),
        }
    }

    // ========================================================================
    // Streaming plumbing
    // ========================================================================

    /// Queue a request for in-order processing (streaming sessions only).
    ///
    /// Fails with [`SessionError::Closed`] once the session has closed; the
    /// request is never queued in that case.
    pub async fn submit(&self, request: JsonRpcRequest) -> Result<(), SessionError> {
        self.wait_ready().await?;
        let sender = lock(&self.inbound)
            .clone()
            .ok_or(SessionError::Closed(self.id))?;
        sender
            .send(request)
            .await
            .map_err(|_| SessionError::Closed(self.id))
    }

    async fn run_inbound(self: Arc<Self>, mut inbound: mpsc::Receiver<JsonRpcRequest>) {
        while let Some(request) = inbound.recv().await {
            if !self.is_open() {
                break;
            }
            let Some(response) = self.handle_request(request).await else {
                continue;
            };
            if !self.is_open() {
                debug!(session = %self.id, "Session closed mid-request, discarding response");
                break;
            }
            self.push(response).await;
        }
        debug!(session = %self.id, "Inbound worker finished");
    }

    async fn push(&self, response: JsonRpcResponse) {
        let Some(sender) = lock(&self.outbound).clone() else {
            debug!(session = %self.id, "No outbound channel, discarding response");
            return;
        };
        if sender.send(response).await.is_err() {
            self.fail("event stream receiver dropped");
        }
    }
}

impl std::fmt::Debug for ProtocolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Map a session error onto the JSON-RPC envelope.
pub fn error_response(id: Option<Value>, err: SessionError) -> JsonRpcResponse {
    match err {
        SessionError::Tool(tool_err) => JsonRpcResponse::error_with_data(
            id,
            codes::INVALID_PARAMS,
            tool_err.to_string(),
            Some(tool_err.payload()),
        ),
        SessionError::Closed(_) => {
            JsonRpcResponse::error(id, codes::SESSION_CLOSED, err.to_string())
        }
        SessionError::RegistryUnavailable => JsonRpcResponse::internal_error(id, err.to_string()),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
