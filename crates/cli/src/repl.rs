//! Line-based chat loop over the shared operator console.

use std::sync::Arc;

use agent::{AgentRuntime, Conversation, TurnOutcome};
use proto::{ProgressEvent, ToolError};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tools::Console;
use tracing::{debug, warn};

const USER_PROMPT: &str = "User: ";

/// One interactive session: a console, the agent, and its history.
pub struct Repl<R, W> {
    console: Arc<Console<R, W>>,
    runtime: Arc<AgentRuntime>,
    conversation: Conversation,
    events: usize,
}

impl<R, W> Repl<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(console: Arc<Console<R, W>>, runtime: Arc<AgentRuntime>) -> Self {
        Self {
            console,
            runtime,
            conversation: Conversation::new(),
            events: 0,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Reads operator lines until `exit`, `quit`, or end of input.
    pub async fn run(&mut self) -> std::io::Result<()> {
        debug!(session = %self.conversation.session_id(), "REPL started");
        loop {
            let Some(line) = self.console.prompt(USER_PROMPT).await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit_command(line) {
                break;
            }

            match self.turn(line).await {
                Ok(TurnOutcome::Reply(text)) => {
                    self.console.print(&format!("Assistant: {text}\n")).await?;
                }
                Ok(TurnOutcome::Declined { reply, .. }) => {
                    self.console.print(&format!("{reply}\n")).await?;
                }
                Err(proto::Error::Tool(ToolError::AuthorizationRequired { tool_name, url })) => {
                    warn!(tool = %tool_name, "Turn stopped: authorization required");
                    self.console
                        .print(&format!("Please login to service: {url}\n"))
                        .await?;
                }
                Err(e) => {
                    warn!(error = %e, "Turn failed");
                    self.console.print(&format!("Error: {e}\n")).await?;
                }
            }
        }
        debug!(
            session = %self.conversation.session_id(),
            messages = self.conversation.len(),
            "REPL finished"
        );
        Ok(())
    }

    /// Runs one agent turn while printing its progress events.
    async fn turn(&mut self, line: &str) -> Result<TurnOutcome, proto::Error> {
        let (tx, mut rx) = mpsc::channel::<ProgressEvent>(32);
        let runtime = &self.runtime;
        let conversation = &mut self.conversation;
        let console = &self.console;
        let events = &mut self.events;

        let turn = async move {
            let result = runtime.run_turn(conversation, line, Some(&tx)).await;
            drop(tx);
            result
        };
        let printer = async move {
            while let Some(event) = rx.recv().await {
                *events += 1;
                let text = format_progress(*events, &event);
                if let Err(e) = console.print(&text).await {
                    debug!(error = %e, "Failed to print progress event");
                }
            }
        };

        let (result, ()) = tokio::join!(turn, printer);
        result
    }
}

fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

fn format_progress(n: usize, event: &ProgressEvent) -> String {
    format!("### ({n}) {}\n", event.describe())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use agent::{ChatRequest, ChatResponse, LlmProvider, TokenUsage, ToolRegistry};
    use async_trait::async_trait;
    use proto::{ConfirmationHandler, DecisionTokens, LlmError, ToolCall, ToolContext};
    use tools::{ConsoleConfirmation, GatePolicy, Tool};

    use super::*;

    type TestConsole = Console<&'static [u8], Vec<u8>>;

    struct ScriptedLlm(Mutex<VecDeque<ChatResponse>>);

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Api("script exhausted".to_string()))
        }
    }

    struct SendDm {
        calls: Mutex<usize>,
        result: fn() -> Result<String, ToolError>,
    }

    #[async_trait]
    impl Tool for SendDm {
        fn name(&self) -> &str {
            "Slack_SendDmToUser"
        }

        fn description(&self) -> &str {
            "Send a Slack direct message"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type":"object"})
        }

        async fn invoke(
            &self,
            _args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            *self.calls.lock().unwrap() += 1;
            (self.result)()
        }
    }

    fn dm_call() -> ChatResponse {
        ChatResponse::ToolCalls(
            vec![ToolCall {
                id: "call-1".to_string(),
                name: "Slack_SendDmToUser".to_string(),
                arguments: serde_json::json!({"user_name":"mateo","message":"hi"}),
            }],
            TokenUsage::default(),
        )
    }

    fn text(reply: &str) -> ChatResponse {
        ChatResponse::Text(reply.to_string(), TokenUsage::default())
    }

    fn build(
        input: &'static str,
        script: Vec<ChatResponse>,
        tool: Arc<SendDm>,
    ) -> Repl<&'static [u8], Vec<u8>> {
        let console: Arc<TestConsole> = Arc::new(Console::new(input.as_bytes(), Vec::new()));
        let handler: Arc<dyn ConfirmationHandler> = Arc::new(ConsoleConfirmation::new(
            console.clone(),
            DecisionTokens::default(),
        ));
        let mut registry = ToolRegistry::new();
        registry.register_with_policy(tool, &GatePolicy::new(["Slack_SendDmToUser"]), &handler);
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedLlm(Mutex::new(script.into()))),
            Arc::new(registry),
            "test-model",
            "mateo@arcade.dev",
        );
        Repl::new(console, Arc::new(runtime))
    }

    async fn output(repl: &Repl<&'static [u8], Vec<u8>>) -> String {
        String::from_utf8(repl.console.lock().await.writer().clone()).expect("utf8")
    }

    fn ok_tool() -> Arc<SendDm> {
        Arc::new(SendDm {
            calls: Mutex::new(0),
            result: || Ok("sent".to_string()),
        })
    }

    #[tokio::test]
    async fn plain_chat_prints_assistant_reply() {
        let mut repl = build("hello\nexit\n", vec![text("Hi there")], ok_tool());
        repl.run().await.expect("repl");

        let out = output(&repl).await;
        assert!(out.contains("Assistant: Hi there\n"));
        assert!(out.contains("### (1) Agent started (round 0)\n"));
        assert!(out.contains("### (2) Agent ended\n"));
        assert_eq!(repl.conversation().len(), 2);
    }

    #[tokio::test]
    async fn approved_call_runs_after_prompt() {
        let tool = ok_tool();
        let mut repl = build(
            "send mateo a dm\nmaybe\nY\nquit\n",
            vec![dm_call(), text("Done")],
            tool.clone(),
        );
        repl.run().await.expect("repl");

        let out = output(&repl).await;
        assert_eq!(*tool.calls.lock().unwrap(), 1);
        assert!(out.contains("I'm about to call Slack_SendDmToUser with these parameters:"));
        assert!(out.contains("Your response (must be either y or n): "));
        assert!(out.contains("Assistant: Done\n"));
    }

    #[tokio::test]
    async fn denied_call_prints_acknowledgement_and_continues() {
        let tool = ok_tool();
        let mut repl = build(
            "send mateo a dm\nn\nthanks\n",
            vec![dm_call(), text("You're welcome")],
            tool.clone(),
        );
        repl.run().await.expect("repl");

        let out = output(&repl).await;
        assert_eq!(*tool.calls.lock().unwrap(), 0);
        assert!(out.contains(
            "Ok, I won't call Slack_SendDmToUser now. What else can I do for you?\n"
        ));
        assert!(out.contains("Assistant: You're welcome\n"));
    }

    #[tokio::test]
    async fn authorization_required_prints_login_url() {
        let tool = Arc::new(SendDm {
            calls: Mutex::new(0),
            result: || {
                Err(ToolError::AuthorizationRequired {
                    tool_name: "Slack_SendDmToUser".to_string(),
                    url: "https://auth.example/slack".to_string(),
                })
            },
        });
        let mut repl = build("dm\ny\n", vec![dm_call()], tool);
        repl.run().await.expect("repl");

        let out = output(&repl).await;
        assert!(out.contains("Please login to service: https://auth.example/slack\n"));
        assert_eq!(repl.conversation().len(), 1);
    }

    #[tokio::test]
    async fn llm_errors_are_reported_and_loop_continues() {
        let mut repl = build("hi\nhi again\n", vec![], ok_tool());
        repl.run().await.expect("repl");

        let out = output(&repl).await;
        assert_eq!(out.matches("Error: LLM error").count(), 2);
    }

    #[test]
    fn exit_commands_are_case_insensitive() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(!is_exit_command("exit now"));
    }

    #[test]
    fn progress_lines_are_numbered() {
        assert_eq!(
            format_progress(3, &ProgressEvent::AgentFinished),
            "### (3) Agent ended\n"
        );
    }
}
