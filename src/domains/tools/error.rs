//! Tool-specific error types.

use serde_json::{Value, json};
use std::error::Error as StdError;
use thiserror::Error;

use super::handlers::HandlerError;

/// Errors that can occur during tool registration and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The input did not match the tool's declared schema. The handler was
    /// not called.
    #[error("Invalid input for tool '{tool}': {reason}")]
    InvalidInput { tool: String, reason: String },

    /// The handler ran and failed.
    #[error("Tool '{tool}' failed: {source}")]
    ExecutionFailed {
        tool: String,
        #[source]
        source: HandlerError,
    },

    /// A tool with this name is already registered.
    #[error("Tool already registered: {0}")]
    Duplicate(String),
}

impl ToolError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new "invalid input" error.
    pub fn invalid_input(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a handler failure, keeping the original cause.
    pub fn execution_failed(tool: impl Into<String>, source: HandlerError) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            source,
        }
    }

    /// Create a new "duplicate" error.
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::Duplicate(name.into())
    }

    /// Stable machine-readable kind, used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "unknown_tool",
            Self::InvalidInput { .. } => "invalid_input",
            Self::ExecutionFailed { .. } => "handler_execution",
            Self::Duplicate(_) => "duplicate_tool",
        }
    }

    /// Name of the tool this error concerns.
    pub fn tool(&self) -> &str {
        match self {
            Self::NotFound(name) | Self::Duplicate(name) => name,
            Self::InvalidInput { tool, .. } | Self::ExecutionFailed { tool, .. } => tool,
        }
    }

    /// Structured payload returned to clients.
    ///
    /// `causes` lists the source chain, outermost first, so the original
    /// handler failure is never lost.
    pub fn payload(&self) -> Value {
        let mut causes = Vec::new();
        let mut source = StdError::source(self);
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }

        json!({
            "error": {
                "kind": self.kind(),
                "tool": self.tool(),
                "message": self.to_string(),
                "causes": causes,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(ToolError::not_found("x").kind(), "unknown_tool");
        assert_eq!(ToolError::invalid_input("x", "bad").kind(), "invalid_input");
        assert_eq!(ToolError::duplicate("x").kind(), "duplicate_tool");
    }

    #[test]
    fn test_payload_keeps_handler_cause() {
        let err = ToolError::execution_failed(
            "eth_get_balance",
            HandlerError::remote(-32000, "header not found"),
        );
        let payload = err.payload();

        assert_eq!(payload["error"]["kind"], "handler_execution");
        assert_eq!(payload["error"]["tool"], "eth_get_balance");
        let causes = payload["error"]["causes"].as_array().unwrap();
        assert_eq!(causes.len(), 1);
        assert!(causes[0].as_str().unwrap().contains("header not found"));
    }

    #[test]
    fn test_payload_without_source() {
        let payload = ToolError::not_found("nonexistent_tool").payload();
        assert_eq!(payload["error"]["tool"], "nonexistent_tool");
        assert!(payload["error"]["causes"].as_array().unwrap().is_empty());
    }
}
