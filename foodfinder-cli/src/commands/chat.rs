use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use reqwest::Client;
use shared::models::{ChatErrorResponse, ChatMessage, ChatReply, ChatRequest};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use url::Url;

pub const GREETING: &str = "Hi there! I'm your Smart Food Finder assistant. I can help you discover the perfect meal. What are you craving today?";
pub const SUGGESTIONS: [&str; 4] = [
    "What's good for lunch?",
    "Recommend something spicy",
    "Best biryani nearby?",
    "Vegetarian options",
];
pub const EMPTY_REPLY: &str = "Sorry, I didn't get a response. Please try again.";
pub const REQUEST_FAILED: &str = "Chat request failed";
pub const QUOTA_MESSAGE: &str =
    "Gemini quota exceeded for this API key. Check your plan/billing (or wait and try again).";

#[derive(Args, Debug)]
#[command(about = "Start an interactive chat with the Smart Food Finder assistant")]
pub struct ChatArgs {
    /// Food Finder server base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,
}

#[derive(Args, Debug)]
#[command(about = "Ask a single question and print the answer")]
pub struct AskArgs {
    /// Question to send
    #[arg()]
    pub text: String,

    /// Food Finder server base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,
}

/// What the assistant shows after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply(String),
    /// Shown to the user, never sent back upstream.
    Error(String),
}

impl TurnOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Reply(text) | Self::Error(text) => text,
        }
    }
}

/// Replaces quota errors with a shorter, actionable message.
pub fn friendly_error(message: &str) -> String {
    if message.to_lowercase().contains("quota") {
        QUOTA_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

/// Extracts the message to show from a failed `/api/chat` response body.
pub fn error_message_from_body(body: &str) -> String {
    let message = serde_json::from_str::<ChatErrorResponse>(body)
        .ok()
        .map(|response| response.display_message().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| REQUEST_FAILED.to_string());
    friendly_error(&message)
}

/// One conversation with the gateway; the greeting is display-only.
pub struct ChatSession {
    client: Client,
    endpoint: Url,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// Creates a session against `server`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(server: &str) -> Result<Self> {
        let mut server_url = Url::parse(server).context("invalid server URL")?;
        if !server_url.path().ends_with('/') {
            let path = format!("{}/", server_url.path());
            server_url.set_path(&path);
        }
        let endpoint = server_url
            .join("api/chat")
            .context("invalid chat endpoint")?;
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            history: Vec::new(),
        })
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Sends `text` with the conversation so far.
    ///
    /// Blank input is ignored and yields `None`.
    pub async fn send(&mut self, text: &str) -> Option<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.history.push(ChatMessage::user(text));
        let outcome = match self.post().await {
            Ok(Some(reply)) => {
                self.history.push(ChatMessage::assistant(reply.clone()));
                TurnOutcome::Reply(reply)
            }
            Ok(None) => TurnOutcome::Reply(EMPTY_REPLY.to_string()),
            Err(message) => TurnOutcome::Error(message),
        };
        Some(outcome)
    }

    async fn post(&self) -> Result<Option<String>, String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ChatRequest::new(self.history.clone()))
            .send()
            .await
            .map_err(|err| friendly_error(&format!("{REQUEST_FAILED}: {}", err.without_url())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(error_message_from_body(&body));
        }

        Ok(serde_json::from_str::<ChatReply>(&body)
            .ok()
            .map(|reply| reply.reply)
            .filter(|reply| !reply.trim().is_empty()))
    }
}

/// Drives the interactive loop over `input`, writing the transcript to `out`.
///
/// # Errors
/// Returns an error if reading input or writing output fails.
pub async fn run_loop<R, W>(session: &mut ChatSession, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "bot> {GREETING}")?;
    writeln!(out, "(type /suggest for ideas, /quit to leave)")?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/suggest" => {
                for suggestion in SUGGESTIONS {
                    writeln!(out, "  - {suggestion}")?;
                }
            }
            text => {
                if let Some(outcome) = session.send(text).await {
                    writeln!(out, "bot> {}", outcome.text())?;
                }
            }
        }
        out.flush()?;
    }

    Ok(())
}

/// Runs an interactive chat on stdin/stdout.
///
/// # Errors
/// Returns an error if the session cannot be created or terminal I/O fails.
pub async fn handle_chat(args: ChatArgs) -> Result<()> {
    let mut session = ChatSession::new(&args.server)?;
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_loop(&mut session, stdin, &mut stdout).await
}

/// Sends a single question and prints the answer.
///
/// # Errors
/// Returns an error if the session cannot be created or the gateway reports a failure.
pub async fn handle_ask(args: AskArgs) -> Result<()> {
    let mut session = ChatSession::new(&args.server)?;
    match session.send(&args.text).await {
        Some(TurnOutcome::Reply(reply)) => {
            println!("{reply}");
            Ok(())
        }
        Some(TurnOutcome::Error(message)) => Err(anyhow::anyhow!(message)),
        None => Err(anyhow::anyhow!("nothing to ask: the question is blank")),
    }
}
