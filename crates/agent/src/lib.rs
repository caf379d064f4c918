//! Agent runtime, conversation history, tool registry, and LLM adapter.

pub mod conversation;
pub mod llm;
pub mod runtime;
pub mod tool_registry;

/// In-memory conversation history.
pub use conversation::Conversation;
/// Chat request/response models and provider interfaces.
pub use llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, OpenAiProvider, TokenUsage};
/// ReAct loop with human-in-the-loop denial handling.
pub use runtime::{AgentRuntime, DenialMode, TurnOutcome};
/// Runtime tool registry.
pub use tool_registry::ToolRegistry;
