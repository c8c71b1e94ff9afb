//! Tool definitions module.
//!
//! Tools are grouped by chain. Every group module exposes a `group` function
//! that builds its [`ToolGroup`] from the shared [`ToolContext`]; the
//! registration policy decides which groups end up in the registry.

pub mod bitcoin;
pub mod cross_chain;
pub mod ethereum;
pub mod general;
pub mod ripple;
pub mod rpc;
pub mod solana;
pub mod ton;
pub mod units;

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;

use super::handlers::HandlerError;
use super::registry::ToolDescriptor;
use crate::core::config::Config;
use rpc::RpcClient;

/// State shared by every tool handler.
#[derive(Debug)]
pub struct ToolContext {
    /// Startup configuration (endpoints, credentials, flags).
    pub config: Arc<Config>,
    /// Pooled HTTP client for chain endpoints.
    pub rpc: RpcClient,
}

impl ToolContext {
    /// Build the context, creating the HTTP client from the configured timeout.
    pub fn new(config: Arc<Config>) -> Result<Self, HandlerError> {
        let rpc = RpcClient::new(Duration::from_secs(config.chains.rpc_timeout_secs))?;
        Ok(Self { config, rpc })
    }
}

/// A named set of tool descriptors enabled together.
#[derive(Debug)]
pub struct ToolGroup {
    pub name: &'static str,
    pub tools: Vec<ToolDescriptor>,
}

impl ToolGroup {
    /// Create an empty group.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tools: Vec::new(),
        }
    }

    /// Add a descriptor to the group.
    pub fn with(mut self, descriptor: ToolDescriptor) -> Self {
        self.tools.push(descriptor);
        self
    }

    /// Names of the tools in this group, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(ToolDescriptor::name).collect()
    }
}

/// Parameters for tools that take no input.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoParams {}

/// Parameters for single-address balance lookups.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddressParams {
    /// Account address on the target chain.
    #[schemars(description = "Account address on the target chain")]
    pub address: String,
}

/// Reject empty or whitespace-padded addresses before hitting the network.
pub(crate) fn clean_address(address: &str) -> Result<&str, HandlerError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(HandlerError::invalid_argument("address must not be empty"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_address() {
        assert_eq!(clean_address("  abc ").unwrap(), "abc");
        assert!(matches!(
            clean_address("   ").unwrap_err(),
            HandlerError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_context_from_default_config() {
        let ctx = ToolContext::new(Arc::new(Config::default())).unwrap();
        assert_eq!(ctx.config.chains.rpc_timeout_secs, 30);
    }
}
