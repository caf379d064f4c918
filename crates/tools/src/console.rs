//! Line-based operator console and the confirmation handler built on it.

use async_trait::async_trait;
use proto::{ConfirmationHandler, Decision, DecisionTokens, PendingConfirmation};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Interactive console shared by the REPL and the confirmation prompter.
///
/// Both read from one buffered reader so that lines typed ahead are never
/// lost between them. Holding the guard returned by [`Console::lock`] gives
/// exclusive use of the terminal.
pub struct Console<R, W> {
    io: Mutex<ConsoleIo<R, W>>,
}

/// Reader/writer pair guarded by a [`Console`].
pub struct ConsoleIo<R, W> {
    reader: R,
    writer: W,
}

impl Console<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Console over the process stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps an arbitrary reader/writer pair.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new(ConsoleIo { reader, writer }),
        }
    }

    /// Takes exclusive use of the console until the guard is dropped.
    pub async fn lock(&self) -> MutexGuard<'_, ConsoleIo<R, W>> {
        self.io.lock().await
    }

    /// Writes `prompt` and reads one line. `None` on end of input.
    pub async fn prompt(&self, prompt: &str) -> std::io::Result<Option<String>> {
        self.lock().await.prompt(prompt).await
    }

    /// Writes `text` as-is.
    pub async fn print(&self, text: &str) -> std::io::Result<()> {
        self.lock().await.write(text).await
    }
}

impl<R, W> ConsoleIo<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Writes and flushes `text`.
    pub async fn write(&mut self, text: &str) -> std::io::Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await
    }

    /// Writes `prompt` and reads one line without its line terminator.
    pub async fn prompt(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        self.write(prompt).await?;
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Everything written so far (for in-memory writers).
    pub fn writer(&self) -> &W {
        &self.writer
    }
}

/// Asks the operator on a [`Console`] before gated tool calls run.
///
/// The console stays locked for the whole question/answer exchange, so
/// concurrent confirmations are asked one after another and never
/// interleave on the terminal.
pub struct ConsoleConfirmation<R, W> {
    console: std::sync::Arc<Console<R, W>>,
    tokens: DecisionTokens,
}

impl<R, W> ConsoleConfirmation<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a prompter over `console` accepting `tokens`.
    pub fn new(console: std::sync::Arc<Console<R, W>>, tokens: DecisionTokens) -> Self {
        Self { console, tokens }
    }

    async fn ask(&self, pending: &PendingConfirmation) -> std::io::Result<Decision> {
        let mut io = self.console.lock().await;
        io.write(&format_confirmation(pending)).await?;

        let mut prompt = format!(
            "Your response [{}/{}]: ",
            self.tokens.approve, self.tokens.deny
        );
        loop {
            let Some(raw) = io.prompt(&prompt).await? else {
                warn!(tool = %pending.tool_name, "Console closed before an answer; denying");
                return Ok(Decision::Deny);
            };
            debug!(tool = %pending.tool_name, answer = %raw, "Operator answered");
            match self.tokens.parse(&raw) {
                Ok(decision) => return Ok(decision),
                Err(err) => {
                    warn!(tool = %pending.tool_name, "{err}");
                    prompt = format!(
                        "Your response (must be either {} or {}): ",
                        self.tokens.approve, self.tokens.deny
                    );
                }
            }
        }
    }
}

#[async_trait]
impl<R, W> ConfirmationHandler for ConsoleConfirmation<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, pending: &PendingConfirmation) -> Decision {
        match self.ask(pending).await {
            Ok(decision) => decision,
            Err(err) => {
                error!(tool = %pending.tool_name, error = %err, "Console failure; denying");
                Decision::Deny
            }
        }
    }
}

/// Human-readable description of a pending call.
fn format_confirmation(pending: &PendingConfirmation) -> String {
    format!(
        "\nThe agent is asking for confirmation:\n\
         I'm about to call {} with these parameters:\n{}\n\
         Do you approve?\n",
        pending.tool_name,
        pending.pretty_arguments()
    )
}
