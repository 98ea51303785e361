use anyhow::Result;
use colored::Colorize;
use parking_lot::Mutex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    app::UIConfig,
    protocol::MemoryUpdate,
    session::{
        AnswerPath, ConversationEntry, ConversationLog, RejectReason, Role, SessionController,
        SessionObservers, SubmitOutcome, Termination,
    },
};

use super::non_interactive::describe_citation;

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ReplInput {
    Query(String),
    Quit,
    History,
    Save(PathBuf),
    /// Slash command that could not be parsed, with a hint for the user
    Invalid(String),
    Blank,
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplInput::Blank;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplInput::Query(line.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        match name {
            "quit" | "exit" | "q" => ReplInput::Quit,
            "history" => ReplInput::History,
            "save" if !rest.is_empty() => ReplInput::Save(PathBuf::from(rest)),
            "save" => ReplInput::Invalid("Usage: /save <path>".to_string()),
            other => ReplInput::Invalid(format!(
                "Unknown command: /{} (try /quit, /history, /save <path>)",
                other
            )),
        }
    }
}

/// Streamed text printed so far for the current answer
#[derive(Clone, Default)]
struct LiveEcho {
    printed: Arc<Mutex<String>>,
}

impl LiveEcho {
    fn push(&self, text: &str) {
        self.printed.lock().push_str(text);
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }

    fn take(&self) -> String {
        std::mem::take(&mut *self.printed.lock())
    }
}

/// Observers that print tokens as they arrive and surface notices
fn terminal_observers(echo: &LiveEcho, ui: &UIConfig) -> SessionObservers {
    let token_echo = echo.clone();
    let show_memory = ui.show_memory_notices;

    SessionObservers {
        on_token: Some(Arc::new(move |text: &str| token_echo.push(text))),
        on_memory: Some(Arc::new(move |update: Option<&MemoryUpdate>| {
            if !show_memory {
                return;
            }
            if let Some(note) = update.and_then(memory_notice) {
                eprintln!("{}", note.dimmed());
            }
        })),
        on_notice: Some(Arc::new(|message: &str| {
            eprintln!("{}", message.yellow());
        })),
    }
}

/// One-line description of a memory write, `None` when nothing was stored
fn memory_notice(update: &MemoryUpdate) -> Option<String> {
    if !update.written {
        return None;
    }
    let target = update.target.as_deref().unwrap_or("memory");
    Some(match update.summary.as_deref().filter(|s| !s.is_empty()) {
        Some(summary) => format!("[{}] {}", target, summary),
        None => format!("[{}] updated", target),
    })
}

/// Line-oriented interactive chat loop
pub struct Repl {
    controller: SessionController,
    echo: LiveEcho,
    ui: UIConfig,
}

impl Repl {
    pub fn new(controller: SessionController, ui: UIConfig) -> Self {
        let echo = LiveEcho::default();
        let controller = controller.with_observers(terminal_observers(&echo, &ui));
        Self {
            controller,
            echo,
            ui,
        }
    }

    pub async fn run(&self) -> Result<()> {
        println!(
            "{}",
            "Ask a question. /history shows the conversation, /save <path> writes it, /quit exits."
                .dimmed()
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{} ", ">".cyan().bold());
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            match ReplInput::parse(&line) {
                ReplInput::Blank => continue,
                ReplInput::Quit => break,
                ReplInput::History => print_history(self.controller.log()),
                ReplInput::Save(path) => match self.controller.log().save_transcript(&path) {
                    Ok(()) => println!("Saved transcript to {}", path.display()),
                    Err(e) => eprintln!("{}", format!("Failed to save transcript: {:#}", e).red()),
                },
                ReplInput::Invalid(hint) => eprintln!("{}", hint.yellow()),
                ReplInput::Query(query) => {
                    let outcome = self.controller.submit(&query).await;
                    self.render(outcome);
                }
            }
        }

        Ok(())
    }

    fn render(&self, outcome: SubmitOutcome) {
        let streamed = self.echo.take();
        match outcome {
            SubmitOutcome::Answered { entry, path } => {
                // Tokens are already on screen unless the final content diverged
                // from them (cached replacement, error frame, fallback)
                if streamed.is_empty() {
                    println!("{}", styled_answer(&entry.content, path));
                } else if streamed == entry.content {
                    println!();
                } else {
                    println!();
                    println!("{}", styled_answer(&entry.content, path));
                }

                if self.ui.show_citations && !entry.citations.is_empty() {
                    println!("{}", "Sources:".bold());
                    for (i, citation) in entry.citations.iter().enumerate() {
                        println!("  [{}] {}", i + 1, describe_citation(citation).dimmed());
                    }
                }
                println!();
            }
            SubmitOutcome::Dropped { .. } => {
                // The notice observer already told the user
                if !streamed.is_empty() {
                    println!();
                }
            }
            SubmitOutcome::Rejected(RejectReason::Busy) => {
                eprintln!("{}", "Still answering the previous question.".yellow());
            }
            SubmitOutcome::Rejected(RejectReason::EmptyQuery) => {}
        }
    }
}

fn styled_answer(content: &str, path: AnswerPath) -> String {
    match path {
        AnswerPath::Stream(Termination::Done) | AnswerPath::Analysis => content.to_string(),
        AnswerPath::Stream(_) => content.red().to_string(),
    }
}

fn print_history(log: &ConversationLog) {
    if log.is_empty() {
        println!("{}", "No messages yet.".dimmed());
        return;
    }
    for entry in log.entries() {
        println!("{}", history_line(&entry));
    }
}

fn history_line(entry: &ConversationEntry) -> String {
    let who = match entry.role {
        Role::User => "you".cyan().bold(),
        Role::Assistant => "ragline".green().bold(),
    };
    format!(
        "{} {} {}: {}",
        format!("#{}", entry.id).dimmed(),
        entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
        who,
        entry.content
    )
}
