//! Core module containing shared infrastructure components.
//!
//! This module provides the foundational building blocks for the MCP server,
//! including error handling, configuration, protocol sessions, server
//! lifecycle management, and transport layer abstractions.

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use server::{McpServer, SessionHandler};
pub use session::{ProtocolSession, SessionId, SessionState};
pub use transport::{TransportConfig, TransportService};
