/// Real-time progress events emitted while the agent handles one turn.
///
/// Sent via `tokio::sync::mpsc` from `AgentRuntime::run_turn()` so the REPL
/// can print a numbered trace of what the agent is doing.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The agent started consulting the LLM (round N of the ReAct loop).
    AgentStarted { round: usize },
    /// A tool call has been dispatched but has not yet completed.
    ToolCallStarted {
        call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    /// A tool call has finished executing.
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        is_error: bool,
    },
    /// The operator declined a gated tool call.
    ToolCallDenied { call_id: String, tool_name: String },
    /// The agent produced its final reply for the turn.
    AgentFinished,
}

impl ProgressEvent {
    /// One-line human-readable description of the event.
    pub fn describe(&self) -> String {
        match self {
            ProgressEvent::AgentStarted { round } => format!("Agent started (round {round})"),
            ProgressEvent::ToolCallStarted { tool_name, .. } => {
                format!("Agent started tool {tool_name}")
            }
            ProgressEvent::ToolCallFinished {
                tool_name,
                is_error: false,
                ..
            } => format!("Agent ended tool {tool_name}"),
            ProgressEvent::ToolCallFinished { tool_name, .. } => {
                format!("Agent ended tool {tool_name} with an error")
            }
            ProgressEvent::ToolCallDenied { tool_name, .. } => {
                format!("User denied tool {tool_name}")
            }
            ProgressEvent::AgentFinished => "Agent ended".to_string(),
        }
    }
}
