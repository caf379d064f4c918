//! Tool trait, the human-in-the-loop confirmation gate, and the remote
//! tool-execution provider client.
//!
//! Real tool implementations live behind an external provider; this crate
//! adapts them to [`Tool`] and decides which of them must be confirmed by
//! an operator before they run.

pub mod console;
pub mod gate;
pub mod provider;

pub use console::{Console, ConsoleConfirmation};
pub use gate::{ConfirmationGate, GatePolicy};
pub use provider::{
    AuthorizationResponse, AuthorizationStatus, HttpToolProvider, RemoteTool, ToolProvider,
    authorize_tools,
};

use async_trait::async_trait;
use proto::{ToolContext, ToolError};

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name exposed to the LLM.
    fn name(&self) -> &str;
    /// Human-readable description for tool selection.
    fn description(&self) -> &str;
    /// JSON schema for accepted tool arguments.
    fn parameters_schema(&self) -> serde_json::Value;
    /// Invokes the tool with JSON args on behalf of `ctx.user_id`.
    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext)
    -> Result<String, ToolError>;
}
