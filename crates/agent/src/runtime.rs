//! ReAct loop that runs one operator turn against the LLM and the tools.

use std::sync::Arc;

use proto::{
    AgentMessage, LlmError, ProgressEvent, Role, ToolCall, ToolContext, ToolError, ToolResult,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    conversation::Conversation,
    llm::{ChatRequest, ChatResponse, LlmProvider, TokenUsage},
    tool_registry::ToolRegistry,
};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that can help with everyday \
tasks using the tools available to you, such as reading and sending email or messaging people \
on Slack. Some tools require the user's confirmation before they run; if the user declines, \
do not try to run that tool again unless asked.";
const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;
const MAX_TOOL_RESULT_CHARS: usize = 16_000;

/// Tool output fed to the model when the operator declines a call in [`DenialMode::ToolResult`].
pub const DENIED_TOOL_OUTPUT: &str = "The user did not allow the tool to run";

/// How a declined tool call is reflected back into the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialMode {
    /// Abandon the turn and record a short scripted exchange about the refusal.
    #[default]
    EndTurn,
    /// Tell the model the call was refused and let it continue the turn.
    ToolResult,
}

/// Result of one operator turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a final answer.
    Reply(String),
    /// The operator declined `tool_name`; `reply` is the assistant's acknowledgement.
    Declined { tool_name: String, reply: String },
}

impl TurnOutcome {
    /// Text to show the operator.
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Reply(text) => text,
            TurnOutcome::Declined { reply, .. } => reply,
        }
    }
}

enum Step {
    Reply(String),
    Declined(String),
}

/// The agent runtime: drives the ReAct loop for a single user
pub struct AgentRuntime {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    model: String,
    user_id: String,
    system_prompt: String,
    max_tool_rounds: usize,
    denial_mode: DenialMode,
}

impl AgentRuntime {
    /// Creates a runtime acting on behalf of `user_id`.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            user_id: user_id.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            denial_mode: DenialMode::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_denial_mode(mut self, mode: DenialMode) -> Self {
        self.denial_mode = mode;
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Handles one operator message and returns the agent's answer.
    ///
    /// On error the conversation is restored to just after the operator's
    /// message, so a half-finished tool exchange never stays in history.
    /// A declined call keeps the calls that already ran in its round.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
        progress: Option<&mpsc::Sender<ProgressEvent>>,
    ) -> Result<TurnOutcome, proto::Error> {
        conversation.push_text(Role::User, user_message);
        let checkpoint = conversation.checkpoint();

        match self.drive(conversation, progress).await {
            Ok(Step::Reply(text)) => Ok(TurnOutcome::Reply(text)),
            Ok(Step::Declined(tool_name)) => {
                let reply = format!("Ok, I won't call {tool_name} now. What else can I do for you?");
                conversation.push_text(
                    Role::Assistant,
                    format!("Please confirm the call to {tool_name}"),
                );
                conversation.push_text(Role::User, "I changed my mind, please don't do it.");
                conversation.push_text(Role::Assistant, reply.clone());
                Ok(TurnOutcome::Declined { tool_name, reply })
            }
            Err(err) => {
                conversation.rollback(checkpoint);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        progress: Option<&mpsc::Sender<ProgressEvent>>,
    ) -> Result<Step, proto::Error> {
        let session_id = conversation.session_id().clone();
        let tool_defs = self.tools.definitions();
        let mut total_usage = TokenUsage::default();

        for round in 0..self.max_tool_rounds {
            emit(progress, ProgressEvent::AgentStarted { round }).await;
            let req = ChatRequest {
                messages: conversation.to_chat_messages(&self.system_prompt),
                tools: tool_defs.clone(),
                model: self.model.clone(),
            };
            debug!("LLM call (round {round}) for session {session_id}");

            match self.llm.chat(req).await? {
                ChatResponse::Text(text, usage) => {
                    total_usage.add(&usage);
                    debug!(
                        prompt_tokens = total_usage.prompt_tokens,
                        completion_tokens = total_usage.completion_tokens,
                        "Turn finished"
                    );
                    info!("Agent final response for session {session_id}: {text:.50}...");
                    conversation.push_text(Role::Assistant, text.clone());
                    emit(progress, ProgressEvent::AgentFinished).await;
                    return Ok(Step::Reply(text));
                }
                ChatResponse::ToolCalls(tool_calls, usage) => {
                    total_usage.add(&usage);
                    debug!(
                        "Tool calls requested: {:?}",
                        tool_calls.iter().map(|tc| &tc.name).collect::<Vec<_>>()
                    );
                    let round_start = conversation.checkpoint();
                    conversation.push(AgentMessage::assistant_tool_calls(
                        session_id.clone(),
                        tool_calls.clone(),
                    ));
                    let mut executed = Vec::with_capacity(tool_calls.len());

                    // Calls from one response run in order; gated prompts never overlap.
                    for tc in &tool_calls {
                        emit(
                            progress,
                            ProgressEvent::ToolCallStarted {
                                call_id: tc.id.clone(),
                                tool_name: tc.name.clone(),
                                args: tc.arguments.clone(),
                            },
                        )
                        .await;

                        let ctx = ToolContext::new(&self.user_id, &tc.id);
                        let result = match self.tools.execute(tc, &ctx).await {
                            Ok(output) => ToolResult::success(
                                &tc.id,
                                &tc.name,
                                truncate_tool_result(&output, MAX_TOOL_RESULT_CHARS),
                            ),
                            Err(ToolError::Denied(denied)) => {
                                emit(
                                    progress,
                                    ProgressEvent::ToolCallDenied {
                                        call_id: tc.id.clone(),
                                        tool_name: denied.tool_name.clone(),
                                    },
                                )
                                .await;
                                match self.denial_mode {
                                    DenialMode::EndTurn => {
                                        // Keep only the calls that actually ran.
                                        conversation.rollback(round_start);
                                        record_executed(conversation, &session_id, executed);
                                        return Ok(Step::Declined(denied.tool_name));
                                    }
                                    DenialMode::ToolResult => {
                                        ToolResult::error(&tc.id, &tc.name, DENIED_TOOL_OUTPUT)
                                    }
                                }
                            }
                            Err(err @ ToolError::AuthorizationRequired { .. }) => {
                                return Err(err.into());
                            }
                            Err(err) => {
                                warn!(tool = %tc.name, error = %err, "Tool call failed");
                                ToolResult::error(&tc.id, &tc.name, err.to_string())
                            }
                        };

                        emit(
                            progress,
                            ProgressEvent::ToolCallFinished {
                                call_id: tc.id.clone(),
                                tool_name: tc.name.clone(),
                                is_error: result.is_error,
                            },
                        )
                        .await;
                        conversation.push(AgentMessage::tool_result(session_id.clone(), &result));
                        executed.push((tc.clone(), result));
                    }
                }
            }
        }

        warn!(
            "Max tool rounds ({}) reached for session {session_id}",
            self.max_tool_rounds
        );
        Err(LlmError::MaxToolRoundsExceeded.into())
    }
}

/// Re-records a partially executed round: the calls that ran and their results.
fn record_executed(
    conversation: &mut Conversation,
    session_id: &proto::SessionId,
    executed: Vec<(ToolCall, ToolResult)>,
) {
    if executed.is_empty() {
        return;
    }
    let (calls, results): (Vec<_>, Vec<_>) = executed.into_iter().unzip();
    conversation.push(AgentMessage::assistant_tool_calls(session_id.clone(), calls));
    for result in &results {
        conversation.push(AgentMessage::tool_result(session_id.clone(), result));
    }
}

async fn emit(progress: Option<&mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        // The receiver may already be gone; progress is best-effort.
        let _ = tx.send(event).await;
    }
}

/// Truncates tool output on a char boundary, noting how much was dropped.
fn truncate_tool_result(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }
    let kept: String = output.chars().take(max_chars).collect();
    format!("{kept}\n...[truncated {} chars]", total - max_chars)
}
