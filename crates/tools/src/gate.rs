//! Human-in-the-loop confirmation gate for sensitive tools.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use proto::{
    ConfirmationHandler, Decision, PendingConfirmation, ToolCallDenied, ToolContext, ToolError,
};
use tracing::{debug, info};

use crate::Tool;

/// Wraps a tool so every invocation needs an operator decision first.
///
/// The gate exposes the same name, description and schema as the wrapped
/// tool. On approval the call is forwarded with the original arguments and
/// context and the delegate's result (or error) is returned untouched.
pub struct ConfirmationGate {
    inner: Arc<dyn Tool>,
    handler: Arc<dyn ConfirmationHandler>,
}

impl ConfirmationGate {
    /// Wraps `inner`, asking `handler` before each call.
    pub fn new(inner: Arc<dyn Tool>, handler: Arc<dyn ConfirmationHandler>) -> Self {
        Self { inner, handler }
    }
}

#[async_trait]
impl Tool for ConfirmationGate {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let pending = PendingConfirmation::new(self.inner.name(), args);
        let decision = self.handler.confirm(&pending).await;
        debug!(tool = %pending.tool_name, call_id = %ctx.call_id, ?decision, "Confirmation resolved");

        match decision {
            Decision::Approve => self.inner.invoke(pending.arguments, ctx).await,
            Decision::Deny => {
                info!(tool = %pending.tool_name, call_id = %ctx.call_id, "Tool call denied by operator");
                Err(ToolCallDenied::new(pending.tool_name).into())
            }
        }
    }
}

/// The set of tool names that must pass through a [`ConfirmationGate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatePolicy {
    enforced: HashSet<String>,
}

impl GatePolicy {
    /// Builds a policy enforcing confirmation for the given tool names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enforced: names.into_iter().map(Into::into).collect(),
        }
    }

    /// `true` when calls to `tool_name` need confirmation.
    pub fn is_enforced(&self, tool_name: &str) -> bool {
        self.enforced.contains(tool_name)
    }

    /// Enforced names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.enforced
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Wraps `tool` in a gate when its name is enforced; returns it unchanged otherwise.
    pub fn apply(
        &self,
        tool: Arc<dyn Tool>,
        handler: &Arc<dyn ConfirmationHandler>,
    ) -> Arc<dyn Tool> {
        if self.is_enforced(tool.name()) {
            debug!(tool = %tool.name(), "Attaching confirmation gate");
            Arc::new(ConfirmationGate::new(tool, Arc::clone(handler)))
        } else {
            tool
        }
    }
}
