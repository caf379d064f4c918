//! Tool registry used by the runtime to list and execute tools.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proto::{ConfirmationHandler, ToolCall, ToolContext, ToolDefinition, ToolError};
use tools::{GatePolicy, Tool};
use tracing::{debug, info, warn};

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    gated: HashSet<String>,
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool as-is.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!("Registering tool: {name}");
        self.tools.insert(name, tool);
    }

    /// Registers a tool, putting a confirmation gate in front of it when `policy` enforces it.
    pub fn register_with_policy(
        &mut self,
        tool: Arc<dyn Tool>,
        policy: &GatePolicy,
        handler: &Arc<dyn ConfirmationHandler>,
    ) {
        let name = tool.name().to_string();
        if policy.is_enforced(&name) {
            info!("Adding confirmation gate to {name}");
            self.gated.insert(name);
        }
        self.register(policy.apply(tool, handler));
    }

    /// Tool definitions for the LLM, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters_schema()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Executes a tool call. Gate denials and tool failures are returned as errors.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        // Arguments that did not parse into an object never reach a gate or a tool.
        if !call.arguments.is_object() {
            let raw = match &call.arguments {
                serde_json::Value::String(raw) => raw.clone(),
                other => other.to_string(),
            };
            warn!(tool = %call.name, call_id = %call.id, "Rejecting malformed tool arguments");
            return Err(ToolError::InvalidArgs(format!(
                "{} expects a JSON object, got: {raw}",
                call.name
            )));
        }
        debug!("Executing tool: {} (call_id: {})", call.name, call.id);
        tool.invoke(call.arguments.clone(), ctx).await
    }

    /// Registered tool names, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `true` when calls to `name` pass through a confirmation gate.
    pub fn is_gated(&self, name: &str) -> bool {
        self.gated.contains(name)
    }
}
