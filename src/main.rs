//! streamchat - terminal front end for the streaming chat engine
//!
//! Each line read from stdin is sent as a prompt; replies are printed as
//! their segments arrive. Logs go to stderr as JSON.

use std::collections::HashMap;
use std::io::Write;
use streamchat::conversation::{Message, MessageId, Sender};
use streamchat::runtime::Notifier;
use streamchat::state_machine::{ChatPhase, NotifyLevel};
use streamchat::{start, ChatUpdate, ClientConfig, HttpChatClient, LoggingClient};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Type a prompt and press enter. Commands: /retry <id>, /stop, /quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send(String),
    Retry(MessageId),
    Stop,
    Quit,
    Help,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    let command = match name {
        "retry" => {
            let id = arg
                .parse::<MessageId>()
                .map_err(|_| format!("Usage: /retry <id> (got {arg:?})"))?;
            Command::Retry(id)
        }
        "stop" => Command::Stop,
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        other => return Err(format!("Unknown command: /{other}")),
    };
    Ok(Some(command))
}

/// Prints notifications on stderr, away from reply text
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        let label = match level {
            NotifyLevel::Info => "info",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error => "error",
        };
        eprintln!("[{label}] {message}");
    }
}

/// Tracks how many segments of each bot message have been printed
#[derive(Default)]
struct Renderer {
    printed: HashMap<MessageId, usize>,
}

impl Renderer {
    /// Segments of `message` not printed yet
    fn unseen<'a>(&mut self, message: &'a Message) -> &'a [String] {
        let seen = self.printed.entry(message.id).or_insert(0);
        let fresh = message.segments.get(*seen..).unwrap_or_default();
        *seen = message.segments.len();
        fresh
    }

    fn render(&mut self, message: &Message) {
        match message.sender {
            Sender::User if message.errored => {
                eprintln!("[#{}] failed; /retry {} to resend", message.id, message.id);
            }
            Sender::User => {
                if self.printed.insert(message.id, 1).is_none() {
                    eprintln!("[#{}] sent", message.id);
                }
            }
            Sender::Bot => {
                let mut stdout = std::io::stdout().lock();
                for segment in self.unseen(message) {
                    let _ = write!(stdout, "{segment}");
                }
                let _ = stdout.flush();
            }
        }
    }
}

async fn render_updates(mut updates: broadcast::Receiver<ChatUpdate>) {
    let mut renderer = Renderer::default();
    loop {
        match updates.recv().await {
            Ok(ChatUpdate::MessageChanged { message }) => renderer.render(&message),
            Ok(ChatUpdate::ExchangeFinished { outcome, .. }) => {
                println!();
                if let Err(e) = outcome {
                    eprintln!("({e})");
                }
            }
            Ok(ChatUpdate::Rejected { reason }) => eprintln!("! {reason}"),
            Ok(ChatUpdate::PhaseChanged { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Renderer fell behind; some updates were dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Read stdin on a dedicated thread so a pending read never holds up shutdown
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout is reserved for reply text
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamchat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    match config.chat_endpoint() {
        Some(endpoint) => tracing::info!(endpoint = %endpoint, "Chat endpoint configured"),
        None => tracing::warn!("CHAT_API_URL is not set; prompts will not be sent"),
    }

    let client = LoggingClient::new(HttpChatClient::new(config.connect_timeout)?);
    let (handle, runtime_task) = start(config, client, TerminalNotifier);
    let renderer = tokio::spawn(render_updates(handle.subscribe()));

    eprintln!("{HELP}");
    let mut lines = spawn_stdin_reader();

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match parse_command(&line) {
                    Ok(Some(Command::Send(text))) => handle.send(text).await?,
                    Ok(Some(Command::Retry(id))) => handle.resend(id).await?,
                    Ok(Some(Command::Stop)) => handle.stop().await?,
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Help)) => eprintln!("{HELP}"),
                    Ok(None) => {}
                    Err(e) => eprintln!("! {e}"),
                }
            }

            result = tokio::signal::ctrl_c() => {
                result?;
                // First Ctrl-C stops the reply; a second one at idle exits
                if handle.snapshot().phase == ChatPhase::Idle {
                    break;
                }
                handle.stop().await?;
            }
        }
    }

    handle.stop().await?;
    drop(handle);
    runtime_task.await?;
    renderer.await?;

    Ok(())
}
