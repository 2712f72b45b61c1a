//! Interactive chat REPL with streaming output and persistent history.

use crate::session;
use anyhow::Result;
use kcore::Model;
use runtime::{Conversation, Outcome};
use rustyline::error::ReadlineError;
use std::path::PathBuf;

/// Interactive chat REPL over one conversation.
pub struct ChatRepl<M: Model> {
    conversation: Conversation<M>,
    editor: rustyline::DefaultEditor,
    history_path: Option<PathBuf>,
}

impl<M: Model> ChatRepl<M> {
    /// Create a new REPL over `conversation`.
    pub fn new(conversation: Conversation<M>) -> Result<Self> {
        let mut editor = rustyline::DefaultEditor::new()?;
        let history_path = history_file_path();
        if let Some(ref path) = history_path {
            let _ = editor.load_history(path);
        }
        Ok(Self {
            conversation,
            editor,
            history_path,
        })
    }

    /// Run the interactive REPL loop.
    pub async fn run(&mut self) -> Result<()> {
        let facts = self.conversation.facts();
        println!(
            "Kestrel chat with {} ({}) in {}",
            facts.provider,
            facts.model,
            facts.root.display()
        );
        println!("Ctrl+D to exit, Ctrl+C to cancel a reply");
        println!("---");

        loop {
            match self.editor.readline("> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(&line);
                    report(session::turn(&mut self.conversation, &line).await);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        self.save_history();
        Ok(())
    }

    /// Save readline history to disk.
    fn save_history(&mut self) {
        if let Some(ref path) = self.history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = self.editor.save_history(path);
        }
    }
}

/// Print how a turn ended.
pub fn report(outcome: Outcome) {
    match outcome {
        Outcome::Completed { rounds, .. } => {
            println!();
            tracing::debug!("turn completed in {rounds} round(s)");
        }
        Outcome::Cancelled => println!("\n(cancelled)"),
        Outcome::Failed(message) => eprintln!("\nError: {message}"),
    }
}

/// Resolve the history file path at `~/.config/kestrel/history`.
fn history_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kestrel").join("history"))
}
