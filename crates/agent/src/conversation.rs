//! In-memory conversation history for one REPL session.

use proto::{AgentMessage, Role, SessionId};

use crate::llm::ChatMessage;

/// Ordered message history of a single session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    session_id: SessionId,
    messages: Vec<AgentMessage>,
}

/// Position in a [`Conversation`] that can be restored with [`Conversation::rollback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl Conversation {
    /// Empty conversation with a fresh session id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty conversation bound to `session_id`.
    pub fn with_session(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends a prebuilt message.
    pub fn push(&mut self, message: AgentMessage) {
        self.messages.push(message);
    }

    /// Appends a plain text message with the given role.
    pub fn push_text(&mut self, role: Role, content: impl Into<String>) {
        let message = AgentMessage::new(self.session_id.clone(), role, content);
        self.messages.push(message);
    }

    /// Marks the current end of the history.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.messages.len())
    }

    /// Drops every message added after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.messages.truncate(checkpoint.0);
    }

    /// History as LLM messages, preceded by `system_prompt`.
    ///
    /// Stored system entries are skipped; the current prompt always wins.
    pub fn to_chat_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(system_prompt))
            .chain(
                self.messages
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .map(ChatMessage::from),
            )
            .collect()
    }
}
