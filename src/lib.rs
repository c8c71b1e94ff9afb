//! Web3 MCP Server Library
//!
//! A Model Context Protocol (MCP) server exposing read-only blockchain tools
//! (Solana, Ethereum, Bitcoin family, XRP, TON, cross-chain) to agents.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, protocol sessions, the server
//!   and the transports (STDIO pipe or HTTP/SSE)
//! - **domains**: business logic
//!   - **tools**: tool registry, registration policy and chain tool groups
//!
//! # Example
//!
//! ```rust,no_run
//! use web3_mcp_server::core::{Config, McpServer, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let transport = TransportService::new(config.transport.clone());
//!     let server = McpServer::new(config)?;
//!     transport.run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
