//! CLI argument parsing and subcommand dispatch.

use crate::session::Options;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod chat;
pub mod providers;
pub mod send;

/// Kestrel coding assistant.
#[derive(Parser, Debug)]
#[command(name = "kestrel", about = "Kestrel coding assistant", version)]
pub struct Cli {
    /// Subcommand to execute; `chat` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file, instead of `.kestrel/config.toml` or the global one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider entry to use instead of the first configured one.
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Project root; defaults to the working directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Approve every tool call without asking.
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive chat REPL.
    Chat,
    /// Run one turn and exit.
    Send {
        /// Message content.
        content: String,
    },
    /// List configured providers.
    Providers,
}

impl Cli {
    /// Session options from the global flags.
    pub fn options(&self) -> Options {
        Options {
            config: self.config.clone(),
            provider: self.provider.clone(),
            root: self.root.clone(),
            yes: self.yes,
        }
    }

    /// Run the selected command.
    pub async fn run(self) -> Result<()> {
        let options = self.options();
        match self.command.unwrap_or(Command::Chat) {
            Command::Chat => chat::run(&options).await,
            Command::Send { content } => send::run(&options, &content).await,
            Command::Providers => providers::run(&options),
        }
    }
}
