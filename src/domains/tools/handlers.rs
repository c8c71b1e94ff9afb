//! Capability handler contracts.
//!
//! Every tool is backed by a [`ToolHandler`]: an async function from a JSON
//! input to a JSON result or a [`HandlerError`]. Most tools are written
//! against the typed [`ChainTool`] trait instead, which declares its
//! parameters as a `schemars`/`serde` struct; [`TypedHandler`] adapts it to
//! the dynamic contract stored in the registry.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a capability handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The HTTP request to the chain endpoint failed.
    #[error("RPC request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a JSON-RPC or API error.
    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The endpoint answered with something we could not interpret.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A credential the handler needs is not configured.
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// Arguments passed schema validation but are semantically wrong.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl HandlerError {
    /// Create a remote RPC error.
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Create an "unexpected response" error.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::UnexpectedResponse(msg.into())
    }

    /// Create an "invalid argument" error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type returned by capability handlers.
pub type HandlerResult = Result<Value, HandlerError>;

/// Dynamic handler contract stored in the registry.
///
/// The input has already been validated against the tool's schema when
/// `call` runs.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with the given arguments.
    async fn call(&self, input: Value) -> HandlerResult;
}

/// Typed tool definition.
///
/// `Params` is both the declared input schema (via `JsonSchema`) and the
/// structural validator (via `Deserialize`).
#[async_trait]
pub trait ChainTool: Send + Sync + 'static {
    /// Input parameters.
    type Params: DeserializeOwned + JsonSchema + Send + 'static;

    /// Tool name as registered in MCP.
    fn name(&self) -> &'static str;

    /// Tool description shown to clients.
    fn description(&self) -> &'static str;

    /// Execute the tool logic.
    async fn execute(&self, params: Self::Params) -> HandlerResult;
}

/// Adapter from a [`ChainTool`] to the dynamic [`ToolHandler`] contract.
pub struct TypedHandler<T>(pub T);

#[async_trait]
impl<T: ChainTool> ToolHandler for TypedHandler<T> {
    async fn call(&self, input: Value) -> HandlerResult {
        let params = T::Params::deserialize(input)
            .map_err(|e| HandlerError::invalid_argument(e.to_string()))?;
        self.0.execute(params).await
    }
}

/// Structural validation of `input` against `P`.
///
/// Used as the registry's schema check, independently of the handler.
pub fn validate_as<P: DeserializeOwned>(input: &Value) -> Result<(), String> {
    P::deserialize(input).map(|_| ()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct AddressParams {
        address: String,
        #[serde(default)]
        verbose: bool,
    }

    struct EchoAddress;

    #[async_trait]
    impl ChainTool for EchoAddress {
        type Params = AddressParams;

        fn name(&self) -> &'static str {
            "echo_address"
        }

        fn description(&self) -> &'static str {
            "Echo the address back"
        }

        async fn execute(&self, params: Self::Params) -> HandlerResult {
            Ok(json!({ "address": params.address, "verbose": params.verbose }))
        }
    }

    #[test]
    fn test_validate_as_accepts_well_formed() {
        assert!(validate_as::<AddressParams>(&json!({ "address": "abc" })).is_ok());
    }

    #[test]
    fn test_validate_as_rejects_missing_field() {
        let err = validate_as::<AddressParams>(&json!({})).unwrap_err();
        assert!(err.contains("address"));
    }

    #[test]
    fn test_validate_as_rejects_wrong_type() {
        assert!(validate_as::<AddressParams>(&json!({ "address": 42 })).is_err());
    }

    #[tokio::test]
    async fn test_typed_handler_executes() {
        let handler = TypedHandler(EchoAddress);
        let result = handler
            .call(json!({ "address": "abc", "verbose": true }))
            .await
            .unwrap();
        assert_eq!(result["address"], "abc");
        assert_eq!(result["verbose"], true);
    }

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::MissingCredential("BLOCKFROST_PROJECT_ID");
        assert_eq!(
            err.to_string(),
            "Missing credential: BLOCKFROST_PROJECT_ID is not set"
        );
    }
}
