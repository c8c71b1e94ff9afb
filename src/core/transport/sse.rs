//! Streaming transport implementation (HTTP + Server-Sent Events).
//!
//! - `GET /` opens an event stream and creates a new protocol session. The
//!   first event (`endpoint`) tells the client where to post its messages,
//!   including the session id.
//! - `POST /messages?sessionId=<id>` queues one JSON-RPC message on that
//!   session and answers `202 Accepted`; the JSON-RPC response arrives on the
//!   stream as a `message` event.
//! - `GET /health` reports liveness and the number of open sessions.
//!
//! Every stream has its own session, so concurrent clients never see each
//! other's responses. Dropping the stream (client disconnect) closes its
//! session; requests still in flight complete and their results are
//! discarded.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use super::config::SseConfig;
use super::{TransportError, TransportResult};
use crate::core::McpServer;
use crate::core::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::core::session::{RouteError, SessionError, SessionId, SessionManager};

/// Responses buffered per stream before the session worker waits.
const OUTBOUND_CAPACITY: usize = 64;

/// Streaming transport handler.
pub struct SseTransport {
    config: SseConfig,
}

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The MCP server instance.
    server: McpServer,
    /// Open streaming sessions.
    sessions: Arc<SessionManager>,
    /// Path announced in the `endpoint` event.
    messages_path: Arc<str>,
}

impl AppState {
    /// Create the shared state for `server`.
    pub fn new(server: McpServer, config: &SseConfig) -> Self {
        Self {
            server,
            sessions: Arc::new(SessionManager::new()),
            messages_path: config.messages_path.as_str().into(),
        }
    }

    /// Open sessions.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }
}

/// Query string of `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

impl SseTransport {
    /// Create a new streaming transport with the given config.
    pub fn new(config: SseConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the router over `state`.
    pub fn router(&self, state: AppState) -> Router {
        let mut app = Router::new()
            .route(&self.config.stream_path, get(open_stream))
            .route(&self.config.messages_path, post(post_message))
            .route("/health", get(health_check))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            app = app.layer(cors);
        }
        app
    }

    /// Run the streaming transport until Ctrl-C.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();
        let state = AppState::new(server, &self.config);
        let sessions = state.sessions().clone();
        let app = self.router(state);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!("Ready - listening on {} (SSE, CORS {})", addr, cors_status);
        info!("  → Stream:   GET {}", self.config.stream_path);
        info!("  → Messages: POST {}?sessionId=<id>", self.config.messages_path);
        info!("  → Health:   GET /health");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(sessions))
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        info!("SSE transport finished");
        Ok(())
    }
}

/// Resolve on Ctrl-C, closing every session so open streams end and the
/// server can drain.
async fn shutdown_signal(sessions: Arc<SessionManager>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, closing {} sessions", sessions.open_count());
    sessions.close_all();
}

/// Closes its session when the event stream is dropped.
struct StreamGuard {
    id: SessionId,
    sessions: Arc<SessionManager>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        debug!(session = %self.id, "Event stream dropped");
        self.sessions.close(self.id);
    }
}

fn message_event(response: &JsonRpcResponse) -> Event {
    Event::default()
        .event("message")
        .json_data(response)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// Open an event stream bound to a fresh session.
#[instrument(skip_all)]
async fn open_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let session = state.server.streaming_session(tx);
    let id = session.id();
    session.open();
    state.sessions.insert(session);
    info!(session = %id, "Event stream opened ({} open)", state.sessions.open_count());

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?sessionId={}", state.messages_path, id));
    let guard = StreamGuard {
        id,
        sessions: state.sessions.clone(),
    };

    let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let response = rx.recv().await?;
        Some((Ok::<_, Infallible>(message_event(&response)), (rx, guard)))
    });

    Sse::new(stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::default())
}

fn error_body(status: StatusCode, kind: &str, message: String) -> Response {
    let body = json!({ "error": { "kind": kind, "message": message } });
    (status, Json(body)).into_response()
}

/// Queue a JSON-RPC message on the addressed session.
///
/// The session is resolved before the body is looked at, so a message sent
/// while no stream is open is always answered with 503.
#[instrument(skip_all, fields(method))]
async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let session = match state.sessions.route(query.session_id.as_deref()) {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejected message: {}", e);
            return e.into_response();
        }
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(session = %session.id(), "Malformed message: {}", e);
            return error_body(StatusCode::BAD_REQUEST, "invalid_message", e.to_string());
        }
    };
    tracing::Span::current().record("method", request.method.as_str());

    match session.submit(request).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(SessionError::Closed(id)) => RouteError::Closed(id).into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            RouteError::NoSession => (StatusCode::SERVICE_UNAVAILABLE, "no_session"),
            RouteError::MissingId | RouteError::Malformed(_) => {
                (StatusCode::BAD_REQUEST, "bad_session_id")
            }
            RouteError::Unknown(_) => (StatusCode::NOT_FOUND, "unknown_session"),
            RouteError::Closed(_) => (StatusCode::GONE, "session_closed"),
        };
        error_body(status, kind, self.to_string())
    }
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "sessions": state.sessions.open_count(),
        "tools": state.server.registry().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
