//! Tools domain module.
//!
//! Tools are the blockchain capabilities exposed to MCP clients. Each tool is
//! a named [`ToolDescriptor`] (declared input schema plus handler) held in
//! the shared [`ToolRegistry`].
//!
//! ## Architecture
//!
//! - `definitions/` - Tool groups, one module per chain
//! - `policy.rs` - Feature flags and the startup registration policy
//! - `registry.rs` - Name-keyed registry with validation and dispatch
//! - `handlers.rs` - Handler contracts (`ToolHandler`, `ChainTool`)
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Implement [`ChainTool`] in the chain's module under `definitions/`
//! 2. Add it to that module's `group` function
//! 3. For a new chain, add a flag and a [`policy::GroupEntry`]

pub mod definitions;
mod error;
mod handlers;
pub mod policy;
pub(crate) mod registry;

pub use definitions::{ToolContext, ToolGroup};
pub use error::ToolError;
pub use handlers::*;
pub use policy::{BITCOIN_FLAG, FeatureFlags, build_registry};
pub use registry::{InputValidator, ToolDescriptor, ToolRegistry};
