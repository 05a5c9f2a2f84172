//! Startup of the `hain` terminal client.
//!
//! Questions are read from stdin, one per line. Lines starting with `/` are
//! commands: `/new`, `/chats`, `/open <id>`, `/attach <path>`, `/logout`,
//! `/quit`, or a tool picker id (`/search what is new in rust`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chat::ids::{ConversationId, MessageId};
use crate::chat::message::Tool;
use crate::chat::message_list::MessageSnapshot;
use crate::client::{BackendClient, ChatBackend, ClientError, FileUpload};
use crate::config::{ChatClientConfig, ConfigError};
use crate::session::{ChatSession, SendRequest, SessionError, format_file_size};
use crate::store::AppStore;
use crate::view::{ConversationView, LoadingIndicator, SearchProgress};

const FRAME: Duration = Duration::from_millis(16);

/// Errors that stop the terminal client.
#[derive(Debug, Error)]
pub enum StartError {
    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Backend client could not be built or reached.
    #[error("backend error: {0}")]
    Client(#[from] ClientError),
    /// Session failure.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    /// Formatter patterns failed to compile.
    #[error("formatter error: {0}")]
    Formatter(#[from] regex::Error),
    /// Terminal I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the terminal client (used by the `hain` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` when stdin closes or `/quit` is entered, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Hain chat v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!("Backend: {}", config.base_url);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(run_client(config)) {
        tracing::error!("Client error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Read and validate the configuration from the environment.
///
/// # Errors
/// Returns an error if a variable is malformed or the result is invalid.
pub fn load_config() -> Result<ChatClientConfig, ConfigError> {
    let config = ChatClientConfig::from_env()?;
    config.validate()?;
    Ok(config)
}

/// A line typed by the user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// Leave.
    Quit,
    /// Start a new conversation.
    New,
    /// List conversations.
    Chats,
    /// Open a stored conversation.
    Open(ConversationId),
    /// Attach a file to the next question.
    Attach(PathBuf),
    /// End the backend session.
    Logout,
    /// Ask a question.
    Ask(SendRequest),
    /// Anything else starting with `/`.
    Unknown(String),
}

impl Command {
    /// Interpret one input line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Ask(SendRequest::text(line));
        };
        let (word, argument) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(word, argument)| (word, argument.trim()));
        match (word, argument) {
            ("quit" | "exit", _) => Self::Quit,
            ("new", _) => Self::New,
            ("chats", _) => Self::Chats,
            ("logout", _) => Self::Logout,
            ("open", id) if !id.is_empty() => Self::Open(ConversationId::new(id)),
            ("attach", path) if !path.is_empty() => Self::Attach(PathBuf::from(path)),
            (tool, question) if !question.is_empty() => Tool::parse(tool).map_or_else(
                || Self::Unknown(word.to_string()),
                |tool| Self::Ask(SendRequest::with_tool(question, tool)),
            ),
            _ => Self::Unknown(word.to_string()),
        }
    }
}

/// Drive a session from stdin until it closes.
///
/// # Errors
/// Returns an error if the client cannot be built or the terminal fails.
pub async fn run_client(config: ChatClientConfig) -> Result<(), StartError> {
    let backend = Arc::new(BackendClient::new(&config)?);
    let store = Arc::new(AppStore::new());
    match backend.current_user().await {
        Ok(Some(user)) => {
            tracing::info!(name = %user.name, "signed in");
            store.set_user(user);
        }
        Ok(None) => tracing::info!("anonymous session"),
        Err(e) => tracing::warn!("Could not fetch current user: {e}"),
    }

    let mut session = ChatSession::new(Arc::clone(&backend), Arc::clone(&store), &config);
    let view = Arc::new(ConversationView::new(&config.reveal)?);
    let printer = spawn_printer(
        Arc::clone(&view),
        session.subscribe(),
        session.subscribe_in_flight(),
        config.search_phase_interval,
    );

    let mut out = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if let Some(name) = store.display_name() {
        write_line(&mut out, &format!("Welcome back, {name}.")).await?;
    }
    write_line(&mut out, Tool::placeholder(None)).await?;

    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::New => {
                session.reset();
                write_line(&mut out, "New conversation.").await?;
            }
            Command::Chats => list_chats(&session, &store, &mut out).await?,
            Command::Open(id) => {
                if let Err(e) = session.load_history(id).await {
                    write_line(&mut out, &format!("Could not open conversation: {e}")).await?;
                }
            }
            Command::Attach(path) => attach_file(&mut session, &path, &mut out).await?,
            Command::Logout => {
                match backend.logout().await {
                    Ok(true) => store.sign_out(),
                    Ok(false) => tracing::warn!("logout not confirmed"),
                    Err(e) => tracing::warn!("logout failed: {e}"),
                }
                session.reset();
            }
            Command::Ask(request) => {
                let report = session.send(request).await?;
                wait_for_reveal(&view, &session.snapshot()).await;
                if let Some(path) = report.navigate_to {
                    tracing::info!(%path, "conversation created");
                }
            }
            Command::Unknown(word) => {
                write_line(&mut out, &format!("Unknown command /{word}")).await?;
            }
        }
    }

    printer.abort();
    Ok(())
}

async fn list_chats<B, W>(
    session: &ChatSession<B>,
    store: &AppStore,
    out: &mut W,
) -> std::io::Result<()>
where
    B: ChatBackend + 'static,
    W: AsyncWrite + Unpin,
{
    if let Err(e) = session.refresh_chats().await {
        tracing::warn!("could not list conversations: {e}");
        return write_line(out, &format!("Could not list conversations: {e}")).await;
    }
    for chat in store.chats().chats {
        write_line(out, &format!("{}  {}", chat.id, chat.title)).await?;
    }
    Ok(())
}

async fn attach_file<B, W>(
    session: &mut ChatSession<B>,
    path: &Path,
    out: &mut W,
) -> std::io::Result<()>
where
    B: ChatBackend + 'static,
    W: AsyncWrite + Unpin,
{
    let upload = match read_upload(path).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not read attachment: {e}");
            return write_line(out, &format!("Could not read {}: {e}", path.display())).await;
        }
    };
    let size = format_file_size(upload.size());
    let status = session.attach(upload).await;
    write_line(out, &format!("{} ({size}): {}", path.display(), status.as_str())).await
}

async fn read_upload(path: &Path) -> std::io::Result<FileUpload> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(FileUpload {
        mime: guess_mime(path).to_string(),
        name,
        bytes,
    })
}

fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

async fn wait_for_reveal(view: &ConversationView, latest: &MessageSnapshot) {
    while view.snapshot().version < latest.version || !view.is_caught_up() {
        tokio::time::sleep(FRAME).await;
    }
    // one more frame so the printer flushes the tail
    tokio::time::sleep(FRAME * 2).await;
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[derive(Default)]
struct Printed {
    bytes: usize,
    closed: bool,
}

fn spawn_printer(
    view: Arc<ConversationView>,
    snapshots: watch::Receiver<MessageSnapshot>,
    in_flight: watch::Receiver<bool>,
    phase_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = print_messages(&view, snapshots, &in_flight, phase_interval).await {
            tracing::warn!("printer stopped: {e}");
        }
    })
}

async fn print_messages(
    view: &ConversationView,
    mut snapshots: watch::Receiver<MessageSnapshot>,
    in_flight: &watch::Receiver<bool>,
    phase_interval: Duration,
) -> std::io::Result<()> {
    let mut out = tokio::io::stdout();
    let mut printed: HashMap<MessageId, Printed> = HashMap::new();
    let mut loading: Option<(MessageId, SearchProgress, Option<usize>)> = None;
    let mut frames = tokio::time::interval(FRAME);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = snapshots.borrow_and_update().clone();
                view.apply(&snapshot);
            }
            _ = frames.tick() => {}
        }

        let snapshot = view.snapshot();
        printed.retain(|id, _| snapshot.get(id).is_some());

        let busy = *in_flight.borrow();
        let indicator = LoadingIndicator::for_state(busy, snapshot.last().map(Arc::as_ref));
        match (indicator, snapshot.last()) {
            (Some(indicator), Some(last)) => {
                if loading.as_ref().is_none_or(|(id, _, _)| id != &last.id) {
                    loading = Some((last.id.clone(), SearchProgress::start(phase_interval), None));
                }
                if let Some((_, progress, shown)) = loading.as_mut() {
                    let phase = match indicator {
                        LoadingIndicator::Typing => 0,
                        LoadingIndicator::WebSearch { .. } => progress.phase(),
                    };
                    if *shown != Some(phase) {
                        *shown = Some(phase);
                        write_line(&mut out, &format!("… {}", indicator.label(phase))).await?;
                    }
                }
            }
            _ => loading = None,
        }

        for message in &snapshot.messages {
            let Some(text) = view.visible_text(&message.id) else {
                continue;
            };
            let entry = printed.entry(message.id.clone()).or_default();
            if entry.closed {
                continue;
            }
            if entry.bytes == 0 && !text.is_empty() {
                out.write_all(format!("{}: ", message.role.label()).as_bytes()).await?;
            }
            if let Some(tail) = text.get(entry.bytes..).filter(|tail| !tail.is_empty()) {
                out.write_all(tail.as_bytes()).await?;
                entry.bytes = text.len();
            }
            let caught_up = view
                .reveal_state(&message.id)
                .is_some_and(|state| state.is_caught_up());
            if message.complete && caught_up && entry.bytes == message.content.len() {
                entry.closed = true;
                if entry.bytes > 0 {
                    out.write_all(b"\n").await?;
                }
            }
        }
        out.flush().await?;
    }
}
