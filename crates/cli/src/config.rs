use agent::DenialMode;
use proto::{ConfigError, DecisionTokens};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;
const DEFAULT_USER_ID: &str = "mateo@arcade.dev";

/// Top-level CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM model/credentials.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool-execution provider connection and acting user.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Which tools to load and which of them need confirmation.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Operator prompt tokens and denial handling.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

/// Agent model config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Chat-completions model id.
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI API key (env `OPENAI_API_KEY` wins).
    #[serde(default)]
    pub api_key: String,
    /// OpenAI-compatible base URL. `None` uses the public endpoint.
    pub base_url: Option<String>,
    /// Maximum LLM/tool rounds per operator turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
            base_url: None,
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    /// Returns the explicit base URL, ignoring empty strings.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url.as_deref().filter(|url| !url.is_empty())
    }
}

fn default_provider_base_url() -> String {
    tools::provider::DEFAULT_BASE_URL.to_string()
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

/// Tool-execution provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider API key (env `ARCADE_API_KEY` wins).
    #[serde(default)]
    pub api_key: String,
    /// Provider REST base URL.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// User the agent acts for; tools are authorized per user.
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_provider_base_url(),
            user_id: default_user_id(),
        }
    }
}

fn default_tool_names() -> Vec<String> {
    [
        "Google_ListEmails",
        "Google_SendEmail",
        "Slack_ListUsers",
        "Slack_SendDmToUser",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_enforced() -> Vec<String> {
    ["Google_SendEmail", "Slack_SendDmToUser"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Tool selection config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Provider tools exposed to the agent.
    #[serde(default = "default_tool_names")]
    pub names: Vec<String>,
    /// Tools that ask the operator before every call.
    #[serde(default = "default_enforced")]
    pub enforce_confirmation: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            names: default_tool_names(),
            enforce_confirmation: default_enforced(),
        }
    }
}

fn default_approve() -> String {
    "y".to_string()
}

fn default_deny() -> String {
    "n".to_string()
}

/// Confirmation prompt config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Answer that lets a gated call run.
    #[serde(default = "default_approve")]
    pub approve: String,
    /// Answer that refuses a gated call.
    #[serde(default = "default_deny")]
    pub deny: String,
    /// `end_turn` or `tool_result`.
    #[serde(default)]
    pub denial_mode: DenialMode,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            approve: default_approve(),
            deny: default_deny(),
            denial_mode: DenialMode::default(),
        }
    }
}

impl ConfirmationConfig {
    /// Validated answer tokens.
    pub fn tokens(&self) -> Result<DecisionTokens, ConfigError> {
        DecisionTokens::new(&self.approve, &self.deny)
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            // Look in current dir, then home dir
            let cwd = std::env::current_dir().ok()?.join("tollgate.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home_config = home_dir()?.join(".tollgate").join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
            None
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        debug!(
            model = %config.agent.model,
            provider = %config.provider.base_url,
            user = %config.provider.user_id,
            tools = config.tools.names.len(),
            "Config loaded"
        );
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.agent.api_key = key;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            self.agent.model = model;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.agent.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("ARCADE_API_KEY") {
            self.provider.api_key = key;
        }
        if let Ok(url) = std::env::var("ARCADE_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Ok(user) = std::env::var("TOLLGATE_USER_ID") {
            self.provider.user_id = user;
        }
    }

    /// Checks values that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.model.trim().is_empty() {
            return Err(ConfigError::MissingField("agent.model".to_string()));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.max_tool_rounds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.provider.user_id.trim().is_empty() {
            return Err(ConfigError::MissingField("provider.user_id".to_string()));
        }
        self.confirmation.tokens()?;

        for name in &self.tools.enforce_confirmation {
            if !self.tools.names.contains(name) {
                warn!(tool = %name, "Confirmation enforced for a tool that is not loaded");
            }
        }
        Ok(())
    }

    /// Directory for `--debug` log files.
    pub fn log_dir() -> PathBuf {
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tollgate")
            .join("logs")
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
