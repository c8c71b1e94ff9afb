//! Session error types.

use thiserror::Error;

use super::state::SessionId;
use crate::domains::tools::ToolError;

/// Errors raised while a session handles a request.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session has closed; the request was not processed.
    #[error("Session {0} is closed")]
    Closed(SessionId),

    /// The shared tool registry has been dropped (process shutting down).
    #[error("Tool registry is no longer available")]
    RegistryUnavailable,

    /// The request named an unknown tool or carried invalid input.
    #[error(transparent)]
    Tool(#[from] ToolError),
}
