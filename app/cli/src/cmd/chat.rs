//! Interactive chat REPL command.

use crate::{repl::ChatRepl, session, terminal};
use anyhow::Result;

/// Enter the interactive REPL.
pub async fn run(options: &session::Options) -> Result<()> {
    let (conversation, events) = session::conversation(options)?;
    let renderer = terminal::spawn_renderer(events);

    let mut repl = ChatRepl::new(conversation)?;
    let result = repl.run().await;

    drop(repl);
    let _ = renderer.await;
    result
}
