use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tool invocation requested by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool-call identifier assigned by the LLM.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments for the call.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a tool call with a freshly generated id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// Tool schema advertised to the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description used for tool selection.
    pub description: String,
    /// JSON schema of accepted arguments.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Builds a definition from name, description and argument schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Per-invocation context threaded from the runtime to the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    /// End user on whose behalf the tool runs (provider authorization scope).
    pub user_id: String,
    /// Tool-call identifier this invocation answers.
    pub call_id: String,
}

impl ToolContext {
    /// Creates a context for one call.
    pub fn new(user_id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            call_id: call_id.into(),
        }
    }
}

/// Outcome of one tool call as recorded in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool-call identifier this result answers.
    pub call_id: String,
    /// Name of the tool that produced the result.
    pub tool_name: String,
    /// Output text (or error message).
    pub output: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result.
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
            is_error: false,
        }
    }

    /// Failed result.
    pub fn error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
            is_error: true,
        }
    }
}
