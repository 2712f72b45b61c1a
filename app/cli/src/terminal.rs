//! Terminal rendering of conversation events and permission prompts.

use kcore::{BlockStart, StreamChunk, ToolEvent, ToolEventKind};
use runtime::{Decision, Event, PermissionRequest};
use std::io::{self, BufRead, Write};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

/// Longest tool result preview printed, in characters.
const PREVIEW_CHARS: usize = 120;

/// Spawn the task that renders events until every sender is gone.
pub fn spawn_renderer(mut events: mpsc::UnboundedReceiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut answers = AnswerReader::default();
        while let Some(event) = events.recv().await {
            match event {
                Event::Chunk(chunk) => render_chunk(&chunk),
                Event::Permission(request) => prompt(request, &mut answers).await,
            }
        }
    })
}

fn render_chunk(chunk: &StreamChunk) {
    match chunk {
        StreamChunk::ContentBlockDelta { .. } => {
            if let Some(text) = chunk.delta_text() {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
        }
        StreamChunk::ContentBlockStart {
            block: BlockStart::ToolUse { name, .. },
            ..
        } => println!("\n[tool] {name}"),
        StreamChunk::ToolCompletion(event) => render_tool(event),
        StreamChunk::Error { message } => eprintln!("\nError: {message}"),
        _ => {}
    }
}

fn render_tool(event: &ToolEvent) {
    match event.kind {
        ToolEventKind::TaskStart => {}
        ToolEventKind::Start => {
            let arguments = serde_json::to_string(&event.arguments).unwrap_or_default();
            println!("[run] {} {}", event.name, preview(&arguments));
        }
        ToolEventKind::Complete => {
            let result = event.result.as_deref().unwrap_or_default();
            println!("[done] {} {}", event.name, preview(result));
        }
        ToolEventKind::Error => {
            let error = event.error.as_deref().unwrap_or_default();
            println!("[failed] {} {}", event.name, preview(error));
        }
    }
}

/// First line of `text`, cut to [`PREVIEW_CHARS`].
pub fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut preview: String = line.chars().take(PREVIEW_CHARS).collect();
    if preview.len() < line.len() || text.lines().nth(1).is_some() {
        preview.push_str(" ...");
    }
    preview
}

/// Reads operator answers from stdin on a detached thread.
///
/// A blocking stdin read cannot be interrupted, so a read left behind by a
/// withdrawn prompt stays pending and is picked up by the next prompt.
/// A line that arrived while no prompt was showing is discarded.
#[derive(Default)]
struct AnswerReader {
    pending: Option<oneshot::Receiver<io::Result<String>>>,
}

impl AnswerReader {
    /// Wait for the next answer line.
    async fn next(&mut self) -> io::Result<String> {
        if let Some(pending) = self.pending.as_mut()
            && !matches!(pending.try_recv(), Err(oneshot::error::TryRecvError::Empty))
        {
            self.pending = None;
        }

        let pending = self.pending.get_or_insert_with(|| {
            let (tx, rx) = oneshot::channel();
            std::thread::spawn(move || {
                let mut line = String::new();
                let read = io::stdin().lock().read_line(&mut line).map(|_| line);
                let _ = tx.send(read);
            });
            rx
        });
        let answer = pending
            .await
            .unwrap_or_else(|_| Err(io::Error::other("stdin reader stopped")));
        self.pending = None;
        answer
    }
}

/// Ask the operator about `request` and answer it.
///
/// The prompt is withdrawn if the gate stops waiting, e.g. when the turn is
/// cancelled.
async fn prompt(mut request: PermissionRequest, answers: &mut AnswerReader) {
    println!(
        "\n[permission] {} wants to run ({} risk, {} of {})",
        request.call.name, request.risk, request.position, request.total
    );
    for (key, value) in &request.call.input {
        let value = value
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| value.to_string());
        println!("  {key}: {}", preview(&value));
    }
    for reason in &request.reasons {
        println!("  - {reason}");
    }
    print!("Allow? [y]es / [a]lways / [n]o: ");
    io::stdout().flush().ok();

    let answer = tokio::select! {
        biased;
        _ = request.responder.closed() => {
            println!("\n[permission] request withdrawn");
            return;
        }
        answer = answers.next() => answer,
    };

    let decision = match answer {
        Ok(line) => parse_answer(&line),
        Err(e) => {
            tracing::warn!("failed to read permission answer: {e}");
            Decision::Deny
        }
    };
    request.responder.respond(decision);
}

/// Map an operator answer to a decision. Anything unrecognised denies.
pub fn parse_answer(line: &str) -> Decision {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Decision::Approve,
        "a" | "always" => Decision::ApproveAndRemember,
        _ => Decision::Deny,
    }
}
