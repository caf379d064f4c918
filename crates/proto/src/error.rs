use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registration/execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Tool-execution provider error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Internal protocol type error.
    #[error("Proto error: {0}")]
    Proto(#[from] ProtoError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// LLM provider errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Remote API failure.
    #[error("{0}")]
    Api(String),

    /// Provider response schema/content was invalid.
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    /// Runtime exceeded configured tool-call rounds.
    #[error("Max tool rounds exceeded")]
    MaxToolRoundsExceeded,

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// The operator declined a gated tool call.
///
/// This is an expected outcome, not a fault: callers turn it into a
/// conversational reply instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Tool call denied by user: {tool_name}")]
pub struct ToolCallDenied {
    /// Name of the tool whose call was declined.
    pub tool_name: String,
}

impl ToolCallDenied {
    /// Creates a denial for the named tool.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }
}

/// Tool execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Requested tool is unknown.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Operator denied the call at the confirmation gate.
    #[error(transparent)]
    Denied(#[from] ToolCallDenied),

    /// The user must authorize the tool with the provider first.
    #[error("Authorization required for {tool_name}: {url}")]
    AuthorizationRequired { tool_name: String, url: String },

    /// Tool process or operation failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Tool call arguments are invalid.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Provider transport/API failure surfaced during a call.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ToolError {
    /// Returns the denial if this error came from the confirmation gate.
    pub fn as_denial(&self) -> Option<&ToolCallDenied> {
        match self {
            ToolError::Denied(denied) => Some(denied),
            _ => None,
        }
    }

    /// `true` when the operator declined the call.
    pub fn is_denial(&self) -> bool {
        self.as_denial().is_some()
    }
}

/// Tool-execution provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Provider response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Internal proto errors
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Invalid role string value.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Operator answer was neither the approve nor the deny token.
    #[error("Malformed response: {0:?}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_config_error_variant() {
        let err = ConfigError::MissingField("provider.api_key".to_string());
        assert!(err.to_string().contains("Missing required field"));
    }

    #[test]
    fn wraps_llm_error_into_top_level_error() {
        let err: Error = LlmError::MaxToolRoundsExceeded.into();
        assert!(err.to_string().contains("Max tool rounds exceeded"));
    }

    #[test]
    fn denial_is_distinguished_from_other_tool_errors() {
        let denied: ToolError = ToolCallDenied::new("SendEmail").into();
        assert!(denied.is_denial());
        assert_eq!(
            denied.as_denial().map(|d| d.tool_name.as_str()),
            Some("SendEmail")
        );
        assert_eq!(denied.to_string(), "Tool call denied by user: SendEmail");

        let failed = ToolError::ExecutionFailed("smtp down".to_string());
        assert!(!failed.is_denial());
        assert!(failed.as_denial().is_none());
    }

    #[test]
    fn provider_error_nests_into_tool_and_top_level_errors() {
        let tool_err: ToolError = ProviderError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        }
        .into();
        assert!(tool_err.to_string().contains("API error (502)"));

        let err: Error = ProviderError::Http("refused".to_string()).into();
        assert!(err.to_string().contains("Provider error"));
    }

    #[test]
    fn authorization_required_carries_url() {
        let err: Error = ToolError::AuthorizationRequired {
            tool_name: "Google_SendEmail".to_string(),
            url: "https://auth.example/login".to_string(),
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("Tool error"));
        assert!(text.contains("https://auth.example/login"));
    }

    #[test]
    fn malformed_response_quotes_raw_input() {
        let err: Error = ProtoError::MalformedResponse("maybe".to_string()).into();
        assert!(err.to_string().contains("\"maybe\""));
    }
}
