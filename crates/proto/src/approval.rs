//! Tool call confirmation types shared by the gate, the console prompter
//! and the agent runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProtoError};

/// Operator's decision on a single gated tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Forward this call to the underlying tool.
    Approve,
    /// Refuse this call.
    Deny,
}

/// One in-flight call awaiting an operator decision. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Name of the tool about to run.
    pub tool_name: String,
    /// JSON arguments the tool will receive.
    pub arguments: serde_json::Value,
}

impl PendingConfirmation {
    /// Creates a pending confirmation for the given tool call.
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Arguments rendered as indented JSON for display.
    pub fn pretty_arguments(&self) -> String {
        serde_json::to_string_pretty(&self.arguments).unwrap_or_else(|_| self.arguments.to_string())
    }
}

/// The two answers an operator may type at a confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTokens {
    /// Token meaning approve (default `y`).
    pub approve: String,
    /// Token meaning deny (default `n`).
    pub deny: String,
}

impl DecisionTokens {
    /// Builds a token pair, rejecting empty or colliding tokens.
    pub fn new(approve: &str, deny: &str) -> Result<Self, ConfigError> {
        let approve = approve.trim().to_lowercase();
        let deny = deny.trim().to_lowercase();
        if approve.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "confirmation.approve".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if deny.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "confirmation.deny".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if approve == deny {
            return Err(ConfigError::InvalidValue {
                field: "confirmation.deny".to_string(),
                reason: format!("must differ from approve token '{approve}'"),
            });
        }
        Ok(Self { approve, deny })
    }

    /// Parses a raw console answer. Case-insensitive, surrounding whitespace ignored.
    pub fn parse(&self, raw: &str) -> Result<Decision, ProtoError> {
        let answer = raw.trim().to_lowercase();
        if answer == self.approve {
            Ok(Decision::Approve)
        } else if answer == self.deny {
            Ok(Decision::Deny)
        } else {
            Err(ProtoError::MalformedResponse(raw.trim().to_string()))
        }
    }
}

impl Default for DecisionTokens {
    fn default() -> Self {
        Self {
            approve: "y".to_string(),
            deny: "n".to_string(),
        }
    }
}

/// Source of operator decisions for gated tool calls.
///
/// Implementations present the pending call to a human and wait for an
/// answer. They must resolve to [`Decision::Deny`] whenever no valid answer
/// can be obtained, so an unanswered call never runs.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    /// Asks the operator about one pending call.
    async fn confirm(&self, pending: &PendingConfirmation) -> Decision;
}
