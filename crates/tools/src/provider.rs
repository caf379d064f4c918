//! Client for the external tool-execution provider.
//!
//! The provider hosts the real tool implementations and keeps per-user
//! OAuth grants for the services those tools touch. Tools are looked up by
//! name, authorized for a user ahead of time, and executed on that user's
//! behalf.

use std::sync::Arc;

use async_trait::async_trait;
use proto::{ProviderError, ToolContext, ToolDefinition, ToolError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::Tool;

/// Public API endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.arcade.dev";

/// Seconds the provider may hold an authorization status request open.
const AUTH_WAIT_SECS: u64 = 45;

/// State of a user's grant for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has never been asked.
    NotStarted,
    /// Waiting for the user to finish the OAuth flow at `url`.
    Pending,
    /// The user granted access.
    Completed,
    /// The flow failed or was refused.
    Failed,
}

/// Provider answer to an authorization request or status poll.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationResponse {
    /// Authorization flow id, used to poll for completion.
    #[serde(default)]
    pub id: Option<String>,
    /// Current status.
    pub status: AuthorizationStatus,
    /// Where the user must go to grant access.
    #[serde(default)]
    pub url: Option<String>,
}

/// External tool-execution provider.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Fetches the LLM-facing schema for a tool.
    async fn definition(&self, tool_name: &str) -> Result<ToolDefinition, ProviderError>;
    /// Starts (or checks) authorization of `tool_name` for `user_id`.
    async fn authorize(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationResponse, ProviderError>;
    /// Long-polls a pending authorization flow.
    async fn wait_for_authorization(
        &self,
        auth_id: &str,
    ) -> Result<AuthorizationResponse, ProviderError>;
    /// Runs a tool for `user_id` and returns its rendered output.
    async fn execute(&self, tool_name: &str, input: Value, user_id: &str)
    -> Result<String, ToolError>;
}

/// HTTP implementation of [`ToolProvider`].
pub struct HttpToolProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    wait_secs: u64,
}

impl HttpToolProvider {
    /// Creates a client for the provider at `base_url`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            wait_secs: AUTH_WAIT_SECS,
        }
    }

    /// Overrides how long each authorization status poll may block.
    pub fn with_wait_secs(mut self, wait_secs: u64) -> Self {
        self.wait_secs = wait_secs;
        self
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `{base}/v1/formatted_tools/{tool_name}` with the name as one escaped segment.
    fn definition_url(&self, tool_name: &str) -> Result<reqwest::Url, ProviderError> {
        let mut url = reqwest::Url::parse(&self.url("/v1/formatted_tools"))
            .map_err(|e| ProviderError::Http(format!("invalid base URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Http(format!("invalid base URL {}", self.base_url)))?
            .push(tool_name);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct FormattedTool {
    function: FormattedFunction,
}

#[derive(Debug, Deserialize)]
struct FormattedFunction {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object")]
    parameters: Value,
}

fn empty_object() -> Value {
    json!({"type": "object", "properties": {}})
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    output: Option<ExecuteOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteOutput {
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error: Option<ExecuteFailure>,
    #[serde(default)]
    authorization: Option<AuthorizationResponse>,
}

#[derive(Debug, Deserialize)]
struct ExecuteFailure {
    message: String,
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    async fn definition(&self, tool_name: &str) -> Result<ToolDefinition, ProviderError> {
        let request = self
            .client
            .get(self.definition_url(tool_name)?)
            .query(&[("format", "openai")]);
        let formatted: FormattedTool = self.send(request).await?;
        debug!(tool = %formatted.function.name, "Fetched tool definition");
        Ok(ToolDefinition::new(
            formatted.function.name,
            formatted.function.description,
            formatted.function.parameters,
        ))
    }

    async fn authorize(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationResponse, ProviderError> {
        let request = self
            .client
            .post(self.url("/v1/tools/authorize"))
            .json(&json!({"tool_name": tool_name, "user_id": user_id}));
        self.send(request).await
    }

    async fn wait_for_authorization(
        &self,
        auth_id: &str,
    ) -> Result<AuthorizationResponse, ProviderError> {
        let wait = self.wait_secs.to_string();
        let request = self
            .client
            .get(self.url("/v1/auth/status"))
            .query(&[("id", auth_id), ("wait", wait.as_str())]);
        self.send(request).await
    }

    async fn execute(
        &self,
        tool_name: &str,
        input: Value,
        user_id: &str,
    ) -> Result<String, ToolError> {
        let request = self.client.post(self.url("/v1/tools/execute")).json(&json!({
            "tool_name": tool_name,
            "input": input,
            "user_id": user_id,
        }));
        let response: ExecuteResponse = self.send(request).await?;
        interpret_execution(tool_name, response)
    }
}

/// Maps an execute response onto the tool result contract.
fn interpret_execution(tool_name: &str, response: ExecuteResponse) -> Result<String, ToolError> {
    let output = response.output.unwrap_or_default();

    if let Some(auth) = output.authorization
        && auth.status != AuthorizationStatus::Completed
    {
        return Err(ToolError::AuthorizationRequired {
            tool_name: tool_name.to_string(),
            url: auth.url.unwrap_or_default(),
        });
    }

    if let Some(failure) = output.error {
        return Err(ToolError::ExecutionFailed(failure.message));
    }
    if !response.success {
        return Err(ToolError::ExecutionFailed(format!(
            "{tool_name} reported failure without details"
        )));
    }

    Ok(match output.value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}

/// Pulls a readable message out of an error body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// A provider-hosted tool exposed through the [`Tool`] trait.
pub struct RemoteTool {
    provider: Arc<dyn ToolProvider>,
    definition: ToolDefinition,
}

impl RemoteTool {
    /// Wraps an already known definition.
    pub fn new(provider: Arc<dyn ToolProvider>, definition: ToolDefinition) -> Self {
        Self {
            provider,
            definition,
        }
    }

    /// Fetches the definition of `tool_name` and wraps it.
    pub async fn load(
        provider: Arc<dyn ToolProvider>,
        tool_name: &str,
    ) -> Result<Self, ProviderError> {
        let definition = provider.definition(tool_name).await?;
        Ok(Self::new(provider, definition))
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn parameters_schema(&self) -> Value {
        self.definition.parameters.clone()
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        debug!(tool = %self.definition.name, call_id = %ctx.call_id, "Executing remote tool");
        self.provider
            .execute(&self.definition.name, args, &ctx.user_id)
            .await
    }
}

/// Makes sure `user_id` has granted every tool in `tool_names`.
///
/// For each pending grant `on_pending(tool_name, url)` is called once and
/// the provider is polled until the user completes the flow.
pub async fn authorize_tools<F>(
    provider: &dyn ToolProvider,
    tool_names: &[String],
    user_id: &str,
    mut on_pending: F,
) -> Result<(), ToolError>
where
    F: FnMut(&str, &str) + Send,
{
    for tool_name in tool_names {
        let mut response = provider.authorize(tool_name, user_id).await?;
        if response.status == AuthorizationStatus::Completed {
            debug!(tool = %tool_name, user = %user_id, "Already authorized");
            continue;
        }

        if response.status != AuthorizationStatus::Failed {
            let url = response.url.clone().unwrap_or_default();
            on_pending(tool_name, &url);
            let auth_id = response.id.clone().ok_or_else(|| {
                ProviderError::Decode(format!("authorization for {tool_name} has no id"))
            })?;
            while matches!(
                response.status,
                AuthorizationStatus::Pending | AuthorizationStatus::NotStarted
            ) {
                response = provider.wait_for_authorization(&auth_id).await?;
            }
        }

        if response.status == AuthorizationStatus::Failed {
            warn!(tool = %tool_name, user = %user_id, "Authorization failed");
            return Err(ToolError::AuthorizationRequired {
                tool_name: tool_name.clone(),
                url: response.url.unwrap_or_default(),
            });
        }
        info!(tool = %tool_name, user = %user_id, "Authorization completed");
    }
    Ok(())
}
