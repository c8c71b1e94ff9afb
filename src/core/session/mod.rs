//! Protocol sessions.
//!
//! A session is one client's connection: it owns the lifecycle state and
//! turns protocol requests into registry invocations.

pub mod error;
#[cfg(feature = "sse")]
pub mod manager;
pub mod protocol_session;
pub mod state;

pub use error::SessionError;
#[cfg(feature = "sse")]
pub use manager::{RouteError, SessionManager};
pub use protocol_session::{ProtocolSession, error_response};
pub use state::{SessionId, SessionState};
