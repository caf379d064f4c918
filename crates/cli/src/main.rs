//! CLI entrypoint and subcommand orchestration.

mod config;
mod repl;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use agent::{AgentRuntime, LlmProvider, OpenAiProvider, ToolRegistry};
use clap::{Parser, Subcommand};
use config::Config;
use proto::ConfirmationHandler;
use tools::{
    Console, ConsoleConfirmation, GatePolicy, HttpToolProvider, RemoteTool, Tool, ToolProvider,
    authorize_tools,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments for the tollgate application.
#[derive(Parser)]
#[command(name = "tollgate")]
#[command(about = "LLM agent REPL with human confirmation for sensitive tools", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug logging to ~/.tollgate/logs/
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// User the agent acts for (overrides config and TOLLGATE_USER_ID)
    #[arg(short, long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// CLI subcommands available in the application.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Chat with the agent (default when no subcommand is given)
    Chat,
    /// List configured tools and whether they require confirmation
    Tools,
    /// Authorize every configured tool for the user, then exit
    Auth,
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Chat => "chat",
            Commands::Tools => "tools",
            Commands::Auth => "auth",
        }
    }
}

#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    // Console logs go to stderr so they never mix with the REPL on stdout.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // WorkerGuard must outlive main() so buffered file writes are flushed on exit.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>;

    if cli.debug {
        let log_dir = Config::log_dir();
        std::fs::create_dir_all(&log_dir).ok();
        let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        _file_guard = Some(guard);

        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter);
        let file = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .with_filter(EnvFilter::new("debug,hyper_util=info,rustls=info,reqwest=info"));
        tracing_subscriber::registry()
            .with(console)
            .with(file)
            .init();

        info!(
            version = env!("CARGO_PKG_VERSION"),
            command = command.label(),
            log_level = %cli.log_level,
            "========== tollgate session start =========="
        );
    } else {
        _file_guard = None;
        fmt()
            .with_env_filter(console_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(user) = cli.user {
        config.provider.user_id = user;
        config.validate()?;
    }

    match command {
        Commands::Chat => cmd_chat(config).await,
        Commands::Tools => cmd_tools(config).await,
        Commands::Auth => cmd_auth(config).await,
    }
}

/// Builds the tool-execution provider client from config.
fn build_tool_provider(config: &Config) -> Arc<HttpToolProvider> {
    if config.provider.api_key.is_empty() {
        warn!("No tool provider API key configured. Set ARCADE_API_KEY.");
    }
    Arc::new(HttpToolProvider::new(
        &config.provider.base_url,
        &config.provider.api_key,
    ))
}

/// Builds the LLM provider from config.
fn build_llm(config: &Config) -> Arc<dyn LlmProvider> {
    let api_key = &config.agent.api_key;
    if api_key.is_empty() {
        warn!("No API key configured. Set OPENAI_API_KEY.");
    }
    match config.agent.effective_base_url() {
        Some(base_url) => Arc::new(OpenAiProvider::with_base_url(api_key, base_url)),
        None => Arc::new(OpenAiProvider::new(api_key)),
    }
}

/// Authorizes all configured tools, printing a login link for each pending grant.
async fn authorize_configured(
    provider: &dyn ToolProvider,
    config: &Config,
) -> anyhow::Result<()> {
    authorize_tools(
        provider,
        &config.tools.names,
        &config.provider.user_id,
        |tool_name, url| {
            println!("Authorization required for {tool_name}. Please visit: {url}");
        },
    )
    .await?;
    info!(
        user = %config.provider.user_id,
        tools = config.tools.names.len(),
        "All tools authorized"
    );
    Ok(())
}

/// Fetches the definitions of every configured tool.
async fn load_tools(
    provider: Arc<dyn ToolProvider>,
    config: &Config,
) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
    let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(config.tools.names.len());
    for name in &config.tools.names {
        let tool = RemoteTool::load(provider.clone(), name).await?;
        tools.push(Arc::new(tool));
    }
    Ok(tools)
}

/// Registers `tools`, gating the ones listed in `[tools] enforce_confirmation`.
fn build_registry(
    tools: Vec<Arc<dyn Tool>>,
    config: &Config,
    handler: &Arc<dyn ConfirmationHandler>,
) -> ToolRegistry {
    let policy = GatePolicy::new(&config.tools.enforce_confirmation);
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register_with_policy(tool, &policy, handler);
    }
    registry
}

/// Runs the interactive chat REPL.
async fn cmd_chat(config: Config) -> anyhow::Result<()> {
    let tokens = config.confirmation.tokens()?;
    let provider = build_tool_provider(&config);
    authorize_configured(provider.as_ref(), &config).await?;
    let tools = load_tools(provider, &config).await?;

    let console = Arc::new(Console::stdio());
    let handler: Arc<dyn ConfirmationHandler> =
        Arc::new(ConsoleConfirmation::new(console.clone(), tokens));
    let registry = Arc::new(build_registry(tools, &config, &handler));

    let mut runtime = AgentRuntime::new(
        build_llm(&config),
        registry,
        &config.agent.model,
        &config.provider.user_id,
    )
    .with_max_tool_rounds(config.agent.max_tool_rounds)
    .with_denial_mode(config.confirmation.denial_mode);
    if let Some(prompt) = &config.agent.system_prompt {
        runtime = runtime.with_system_prompt(prompt);
    }

    info!(
        model = %config.agent.model,
        user = %config.provider.user_id,
        tools = ?runtime.tools().tool_names(),
        "Starting chat"
    );
    repl::Repl::new(console, Arc::new(runtime)).run().await?;
    println!("Goodbye!");
    Ok(())
}

/// Lists configured tools and their gating.
async fn cmd_tools(config: Config) -> anyhow::Result<()> {
    let provider = build_tool_provider(&config);
    let tools = load_tools(provider, &config).await?;
    let policy = GatePolicy::new(&config.tools.enforce_confirmation);
    for tool in &tools {
        println!("{}", format_tool_line(tool.name(), tool.description(), &policy));
    }
    Ok(())
}

/// Authorizes every configured tool and exits.
async fn cmd_auth(config: Config) -> anyhow::Result<()> {
    let provider = build_tool_provider(&config);
    authorize_configured(provider.as_ref(), &config).await?;
    println!(
        "All {} tools are authorized for {}",
        config.tools.names.len(),
        config.provider.user_id
    );
    Ok(())
}

fn format_tool_line(name: &str, description: &str, policy: &GatePolicy) -> String {
    let marker = if policy.is_enforced(name) {
        "[confirm]"
    } else {
        "         "
    };
    let summary = description.lines().next().unwrap_or_default();
    format!("{marker} {name}  {summary}")
}
