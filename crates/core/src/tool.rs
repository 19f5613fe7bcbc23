//! Tool trait — the abstraction over model-callable functions.
//!
//! Tools are what give the agent read access to structured data:
//! the canonical one fetches all attendee profiles for match reasoning.
//! Tools must be safe to call multiple times within one turn; the
//! registry never retries on its own.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// A request to execute a tool.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content, fed back to the model verbatim
    pub output: String,
}

/// The core Tool trait.
///
/// Tools are registered in the ToolRegistry and made available to the
/// session controller's tool-use loop. Request-scoped context (store
/// handle, caller id) lives in the tool struct itself.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "fetch_profiles").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given (already schema-validated) arguments.
    async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, built fresh per request.
///
/// The session controller uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up, validate, and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Whether the registry has no tools at all.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call: resolve the tool, validate the model-supplied
    /// arguments against the tool's schema, then run the executor.
    ///
    /// Validation failures are returned as `InvalidArguments` so the caller
    /// can feed them back to the model as a failed tool result.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        validate_arguments(&call.name, &tool.parameters_schema(), &call.arguments)?;

        tool.execute(call.arguments.clone()).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural validation of tool arguments against a JSON-schema-shaped
/// parameter declaration.
///
/// Checks the top-level object type, required keys, and primitive types of
/// declared properties. Deeper schema features (formats, unions) are the
/// tool's own responsibility.
pub fn validate_arguments(
    tool_name: &str,
    schema: &Value,
    arguments: &Value,
) -> std::result::Result<(), ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason,
    };

    if schema.get("type").and_then(Value::as_str) != Some("object") {
        // Tools without an object schema accept anything.
        return Ok(());
    }

    let args = arguments
        .as_object()
        .ok_or_else(|| invalid(format!("expected an object, got {arguments}")))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(key) {
                return Err(invalid(format!("missing required property '{key}'")));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    for (key, value) in args {
        let Some(decl) = properties.and_then(|p| p.get(key)) else {
            return Err(invalid(format!("unexpected property '{key}'")));
        };

        let Some(expected) = decl.get("type").and_then(Value::as_str) else {
            continue;
        };

        let matches = match expected {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };

        if !matches {
            return Err(invalid(format!(
                "property '{key}' should be of type {expected}"
            )));
        }
    }

    Ok(())
}
