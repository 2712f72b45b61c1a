//! Kestrel CLI application: resolves config, wires providers, tools, and
//! project facts into a conversation, and drives it from the terminal.

pub use cmd::{Cli, Command};

pub mod cmd;
pub mod config;
pub mod facts;
pub mod repl;
pub mod session;
pub mod terminal;
pub mod tools;
