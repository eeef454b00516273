//! Scribe CLI - line-oriented driver for one section's assistant session.
//!
//! # Event Loop
//!
//! ```text
//! idle:      prompt ─► read line ─► command | start_message
//! streaming: select! { next stream event ─► render,
//!                      next stdin line   ─► command | start_message (supersedes) }
//! ```
//!
//! Streamed text is printed as it arrives. When a turn starts or ends, and when a
//! suggestion note arrives, the conversation is mirrored to the key-value store
//! (assisted mode only). Accepted suggestions are folded into the resume context.

mod commands;
mod render;

use std::{
    fs::{self, OpenOptions},
    io::{Write, stdout},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scribe_engine::{
    AssistClient, AssistMode, AssistSession, ConversationExport, ConversationStats, FileStore,
    HistoryPersistence, KeyValueStore, MemoryStore, ModeController, ResumeContext, ScribeConfig,
    Section, SessionUpdate, refinements,
};
use scribe_utils::sanitize_terminal_text;

use commands::{Command, Input, command_help};

/// Resume assistant session for one section.
#[derive(Parser, Debug)]
#[command(name = "scribe", version)]
struct Args {
    /// Resume section: projects, experience, education, summary, skills
    #[arg(short, long, default_value = "projects")]
    section: Section,

    /// Session identifier sent with every request
    #[arg(long, default_value = "default")]
    session: String,

    /// Assistant server origin (overrides config and SCRIBE_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Target job title included in the resume context
    #[arg(long)]
    target_job: Option<String>,

    /// Directory for /export files
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_scribe_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with the conversation.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_scribe_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in scribe_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn scribe_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.scribe/logs/scribe.log
    if let Some(dir) = scribe_engine::scribe_dir() {
        candidates.push(dir.join("logs").join("scribe.log"));
    }

    // Fallback: ./.scribe/logs/scribe.log
    candidates.push(PathBuf::from(".scribe").join("logs").join("scribe.log"));

    candidates
}

fn open_store(config: &ScribeConfig) -> Box<dyn KeyValueStore> {
    let quota = config.storage_quota_bytes();
    let Some(path) = config.storage_path() else {
        tracing::warn!("No home directory; conversation history will not survive restarts");
        return Box::new(MemoryStore::with_quota(quota));
    };
    match FileStore::open(&path, quota) {
        Ok(store) => Box::new(store),
        Err(e) => {
            eprintln!("Warning: cannot open storage at {}: {e}", path.display());
            Box::new(MemoryStore::with_quota(quota))
        }
    }
}

/// Updates after which the stored conversation is rewritten.
///
/// Streamed fragments are mirrored when their turn ends rather than per
/// fragment; a suggestion note is a whole message and is written at once.
fn mirrors_history(update: &SessionUpdate) -> bool {
    match update {
        SessionUpdate::Suggestion { note, .. } => note.is_some(),
        SessionUpdate::Done | SessionUpdate::Failed(_) => true,
        SessionUpdate::Content(_)
        | SessionUpdate::ContentSuppressed
        | SessionUpdate::DuplicateSuggestion
        | SessionUpdate::RateLimit(_) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct Repl {
    session: AssistSession,
    mode: ModeController,
    history: HistoryPersistence,
    store: Box<dyn KeyValueStore>,
    export_dir: PathBuf,
    /// A streamed assistant line is open and needs a trailing newline.
    mid_line: bool,
}

impl Repl {
    fn section(&self) -> Section {
        self.session.section()
    }

    fn prompt(&self) {
        let tag = match self.mode.mode() {
            AssistMode::Ai => "ai",
            AssistMode::Manual => "manual",
        };
        print!("{}[{tag}]> ", self.section().as_str());
        let _ = stdout().flush();
    }

    fn end_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }

    fn persist_history(&mut self) {
        self.history.save(self.store.as_mut(), self.session.messages());
    }

    fn render(&mut self, update: SessionUpdate) {
        let persist = mirrors_history(&update);
        self.show(update);
        if persist {
            self.persist_history();
        }
    }

    fn show(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Content(text) => {
                print!("{}", sanitize_terminal_text(&text));
                let _ = stdout().flush();
                self.mid_line = true;
            }
            SessionUpdate::Suggestion { note, applied } => {
                self.end_line();
                if let Some(note) = note {
                    println!("{}", sanitize_terminal_text(&note));
                }
                if applied && let Some(suggestion) = self.session.current_suggestion() {
                    println!("{}", render::suggestion(suggestion));
                }
            }
            SessionUpdate::Done => {
                self.end_line();
                let status = self.session.rate_limit_status();
                if status.is_low() || status.is_exhausted() {
                    println!("{}", render::limits(self.session.rate_limits(), status));
                }
            }
            SessionUpdate::Failed(message) => {
                self.end_line();
                println!("Error: {}", sanitize_terminal_text(&message));
            }
            SessionUpdate::ContentSuppressed
            | SessionUpdate::DuplicateSuggestion
            | SessionUpdate::RateLimit(_) => {}
        }
    }

    fn set_mode(&mut self, mode: AssistMode) {
        self.mode.set_mode(mode, self.store.as_mut());
        self.after_mode_change();
    }

    fn after_mode_change(&mut self) {
        self.history.set_mode(self.mode.mode());
        if self.mode.show_welcome() {
            println!("{}", render::welcome(self.section()));
            self.mode.dismiss_welcome();
        } else {
            println!("Manual mode. Edit {} directly.", self.section().display_name());
        }
        if self.mode.is_ai() && self.session.messages().is_empty() {
            let restored = self.history.load(self.store.as_ref());
            if !restored.is_empty() && self.session.restore_history(restored) {
                println!(
                    "Restored {} message(s) for {}.",
                    self.session.messages().len(),
                    self.section().display_name()
                );
            }
        } else if self.mode.is_ai() {
            self.persist_history();
        }
    }

    fn send(&mut self, text: &str) {
        if self.mode.is_manual() {
            println!("Manual mode is on. Use /ai to work with the assistant.");
            return;
        }
        let status = self.session.rate_limit_status();
        if status.is_exhausted() {
            println!("{}", render::limits(self.session.rate_limits(), status));
            return;
        }
        self.end_line();
        if self.session.start_message(text) {
            self.persist_history();
        }
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        match Input::parse(line) {
            Input::Empty => {}
            Input::Message(text) => self.send(text),
            Input::Command(command) => return self.handle_command(command).await,
        }
        Flow::Continue
    }

    async fn handle_command(&mut self, command: Command<'_>) -> Flow {
        self.end_line();
        match command {
            Command::ToggleMode => {
                self.mode.toggle(self.store.as_mut());
                self.after_mode_change();
            }
            Command::Ai => self.set_mode(AssistMode::Ai),
            Command::Manual => self.set_mode(AssistMode::Manual),
            Command::Accept => match self.session.accept_suggestion() {
                Some(accepted) => {
                    let mut context = self.session.context().clone();
                    context.record_accepted(&accepted);
                    self.session.set_context(context);
                    match serde_json::to_string_pretty(&accepted) {
                        Ok(json) => println!("Accepted:\n{}", sanitize_terminal_text(&json)),
                        Err(e) => println!("Accepted, but could not display it: {e}"),
                    }
                }
                None => println!("No suggestion to accept."),
            },
            Command::Reject => {
                if self.session.current_suggestion().is_some() {
                    self.session.reject_suggestion();
                    println!("Suggestion discarded.");
                } else {
                    println!("No suggestion to reject.");
                }
            }
            Command::Refine(None) => {
                println!(
                    "{}",
                    render::refinement_menu(self.section(), refinements(self.section()))
                );
            }
            Command::Refine(Some(kind)) => match self.session.start_refinement(kind) {
                Some(refinement) => {
                    println!("> {}", refinement.prompt);
                    self.persist_history();
                }
                None => println!("No active suggestion to refine."),
            },
            Command::Cancel => {
                if self.session.is_streaming() {
                    self.session.cancel_request();
                    println!("Cancelled.");
                    self.persist_history();
                }
            }
            Command::Clear => {
                self.session.clear_messages();
                self.history.clear(self.store.as_mut());
                println!("Conversation cleared.");
            }
            Command::Export => self.export(),
            Command::Stats => {
                println!(
                    "{}",
                    render::stats(&ConversationStats::of(self.session.messages()))
                );
            }
            Command::Limits => {
                println!(
                    "{}",
                    render::limits(
                        self.session.rate_limits(),
                        self.session.rate_limit_status()
                    )
                );
            }
            Command::ResetLimits => match self.session.reset_rate_limits().await {
                Ok(()) => println!("Limits reset."),
                Err(e) => println!("Failed to reset limits: {}", sanitize_terminal_text(&e.to_string())),
            },
            Command::Help => println!("{}", command_help()),
            Command::Quit => return Flow::Quit,
            Command::Unknown(cmd) => println!("Unknown command: /{cmd}. Try /help."),
            Command::Empty => {}
        }
        Flow::Continue
    }

    fn export(&self) {
        let export = match ConversationExport::new(
            self.section(),
            self.session.messages(),
            chrono::Utc::now(),
        ) {
            Ok(export) => export,
            Err(e) => {
                println!("Export failed: {e}");
                return;
            }
        };
        match export.write_to(&self.export_dir) {
            Ok(path) => println!("Exported to {}", path.display()),
            Err(e) => println!("Export failed: {e}"),
        }
    }

    async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        if self.mode.is_ai() && !self.session.messages().is_empty() {
            println!(
                "Restored {} message(s) for {}.",
                self.session.messages().len(),
                self.section().display_name()
            );
        }
        println!("Type /help for commands.");

        loop {
            if self.session.is_streaming() {
                tokio::select! {
                    update = self.session.wait_for_event() => {
                        if let Some(update) = update {
                            self.render(update);
                        }
                    }
                    line = lines.next_line() => {
                        let Some(line) = line? else { break };
                        if self.handle_line(&line).await == Flow::Quit {
                            break;
                        }
                    }
                }
                continue;
            }

            self.prompt();
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if self.handle_line(&line).await == Flow::Quit {
                break;
            }
        }

        self.session.cancel_request();
        self.end_line();
        self.persist_history();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = match ScribeConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Warning: {e}; using defaults");
            ScribeConfig::default()
        }
    };

    let base_url = args.api_url.clone().unwrap_or_else(|| config.api_base_url());
    let client = AssistClient::with_connect_timeout(&base_url, config.connect_timeout())?;
    tracing::info!(section = %args.section, base_url = %base_url, "Starting session");

    let store = open_store(&config);
    let mode = ModeController::load(args.section, store.as_ref());
    let history = HistoryPersistence::for_mode(args.section, mode.mode(), config.history_settings());

    let mut context = ResumeContext::default();
    if let Some(job) = args.target_job {
        context = context.with_target_job(job);
    }

    let session = AssistSession::new(client, args.section, args.session, context)
        .with_rate_limit_defaults(config.rate_limit_defaults())
        .with_history(history.load(store.as_ref()));

    let mut repl = Repl {
        session,
        mode,
        history,
        store,
        export_dir: args.export_dir,
        mid_line: false,
    };
    repl.run().await
}
