//! One-shot message command.

use crate::{session, terminal};
use anyhow::Result;
use runtime::Outcome;

/// Run one turn for `content` and print the reply.
pub async fn run(options: &session::Options, content: &str) -> Result<()> {
    let (mut conversation, events) = session::conversation(options)?;
    let renderer = terminal::spawn_renderer(events);

    let outcome = session::turn(&mut conversation, content).await;
    drop(conversation);
    let _ = renderer.await;

    match outcome {
        Outcome::Completed { .. } => {
            println!();
            Ok(())
        }
        Outcome::Cancelled => anyhow::bail!("cancelled"),
        Outcome::Failed(message) => anyhow::bail!(message),
    }
}
