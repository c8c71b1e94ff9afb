//! Tool Registry - central registration and dispatch for all tools.
//!
//! This module provides:
//! - [`ToolDescriptor`]: name, declared input schema, validator and handler
//! - [`ToolRegistry`]: the name-keyed map every session dispatches through
//!
//! The registry is filled once at startup by the registration policy and then
//! shared behind an `Arc`; nothing can be added or removed after that, so
//! concurrent `invoke` calls need no locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rmcp::handler::server::tool::cached_schema_for_type;
use rmcp::model::{JsonObject, Tool};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::error::ToolError;
use super::handlers::{ChainTool, ToolHandler, TypedHandler, validate_as};

/// Structural validator for a tool's input.
pub type InputValidator = fn(&Value) -> Result<(), String>;

// ============================================================================
// Tool Descriptor
// ============================================================================

/// One registered tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: &'static str,
    description: &'static str,
    input_schema: Arc<JsonObject>,
    validator: InputValidator,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    /// Build a descriptor from its parts.
    pub fn new(
        name: &'static str,
        description: &'static str,
        input_schema: Arc<JsonObject>,
        validator: InputValidator,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name,
            description,
            input_schema,
            validator,
            handler,
        }
    }

    /// Build a descriptor from a typed tool; schema and validator are both
    /// derived from `T::Params`.
    pub fn typed<T: ChainTool>(tool: T) -> Self {
        Self::new(
            tool.name(),
            tool.description(),
            cached_schema_for_type::<T::Params>(),
            validate_as::<T::Params>,
            Arc::new(TypedHandler(tool)),
        )
    }

    /// Tool name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Tool description.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Check `input` against the declared schema.
    pub fn validate(&self, input: &Value) -> Result<(), ToolError> {
        (self.validator)(input).map_err(|reason| ToolError::invalid_input(self.name, reason))
    }

    /// Whether two descriptors share the same handler instance.
    fn same_handler(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.into(),
            description: Some(self.description.into()),
            input_schema: self.input_schema.clone(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Tool registry - maps tool names to descriptors.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, ToolDescriptor>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// Registering the very same descriptor again is a no-op; any other
    /// descriptor reusing a taken name is rejected.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), ToolError> {
        if let Some(existing) = self.tools.get(descriptor.name) {
            if existing.same_handler(&descriptor) {
                debug!("Tool {} already registered, skipping", descriptor.name);
                return Ok(());
            }
            return Err(ToolError::duplicate(descriptor.name));
        }

        debug!("Registered tool {}", descriptor.name);
        self.tools.insert(descriptor.name, descriptor);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        self.tools.get(name).ok_or_else(|| ToolError::not_found(name))
    }

    /// Validate `input` and call the tool's handler.
    ///
    /// The handler is never called with input that fails validation. Handler
    /// failures are wrapped in [`ToolError::ExecutionFailed`] with the
    /// original error as source; nothing is retried here.
    #[instrument(skip(self, input))]
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let descriptor = self.resolve(name).inspect_err(|_| {
            warn!("Unknown tool requested: {}", name);
        })?;

        descriptor.validate(&input).inspect_err(|e| {
            warn!("Rejected input: {}", e);
        })?;

        descriptor
            .handler
            .call(input)
            .await
            .map_err(|source| ToolError::execution_failed(name, source))
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tool names, sorted.
    pub fn tool_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Get all tools as Tool models (metadata), sorted by name.
    pub fn tools(&self) -> Vec<Tool> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(ToolDescriptor::to_tool)
            .collect()
    }
}
