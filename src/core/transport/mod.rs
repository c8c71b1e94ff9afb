//! Transport layer for the MCP server.
//!
//! Two mutually exclusive bindings, selected at startup:
//! - **STDIO**: one pipe session for the life of the process - feature: `stdio`
//! - **SSE**: HTTP event stream plus POSTed messages, one session per stream -
//!   feature: `sse`
//!
//! # Feature Flags
//!
//! Transport implementations are conditionally compiled based on features:
//! - `stdio` (default): STDIO transport - minimal dependencies
//! - `sse` (default): SSE transport - adds axum, tower-http

mod config;
mod error;
mod service;

#[cfg(feature = "sse")]
pub mod sse;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "sse")]
pub use config::SseConfig;
