//! Shared protocol types for the agent runtime, tools, and the CLI.
//!
//! This crate defines serializable message/event/tool structures, the
//! confirmation types used by the human-in-the-loop gate, and the
//! strongly-typed error enums shared across the workspace.

pub mod approval;
pub mod error;
pub mod event;
pub mod message;
pub mod tool;

/// Re-export of confirmation request/decision types.
pub use approval::{ConfirmationHandler, Decision, DecisionTokens, PendingConfirmation};
/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of runtime progress events.
pub use event::ProgressEvent;
/// Re-export of conversation/message identity types.
pub use message::{AgentMessage, Role, SessionId};
/// Re-export of tool call definition, context and result types.
pub use tool::{ToolCall, ToolContext, ToolDefinition, ToolResult};
