//! Tests for turn orchestration against a scripted model.

use compact_str::CompactString;
use futures_util::{StreamExt, stream};
use kcore::{
    ChunkStream, Error, Message, Model, Request, Response, Result, Role, StreamChunk, Tool,
    ToolCall, ToolEventKind,
};
use kestrel_runtime::{
    Conversation, DENIED, Event, MAX_ROUNDS, Outcome, SessionFacts, Toolbox,
};
use schemars::json_schema;
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted round: chunks, then optionally a stream that never ends.
struct Round {
    items: Vec<Result<StreamChunk>>,
    stall: bool,
}

/// A model that replays scripted rounds and records every request.
#[derive(Clone, Default)]
struct Scripted {
    rounds: Arc<Mutex<VecDeque<Round>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Scripted {
    fn new(rounds: impl IntoIterator<Item = Vec<StreamChunk>>) -> Self {
        let model = Self::default();
        for chunks in rounds {
            model.push(chunks.into_iter().map(Ok).collect(), false);
        }
        model
    }

    fn push(&self, items: Vec<Result<StreamChunk>>, stall: bool) {
        self.rounds
            .lock()
            .unwrap()
            .push_back(Round { items, stall });
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Model for Scripted {
    fn name(&self) -> CompactString {
        "scripted".into()
    }

    async fn send(&self, _request: &Request) -> Result<Response> {
        Err(Error::Transport("scripted model only streams".into()))
    }

    fn stream(&self, request: Request) -> ChunkStream {
        self.requests.lock().unwrap().push(request);
        let round = self.rounds.lock().unwrap().pop_front().unwrap_or(Round {
            items: text_reply("script exhausted").into_iter().map(Ok).collect(),
            stall: false,
        });
        let items = stream::iter(round.items);
        if round.stall {
            items.chain(stream::pending()).boxed()
        } else {
            items.boxed()
        }
    }

    fn available_models(&self) -> Vec<CompactString> {
        vec!["scripted-1".into()]
    }

    fn default_model(&self) -> CompactString {
        "scripted-1".into()
    }

    fn token_limit(&self) -> usize {
        100_000
    }
}

fn text_reply(text: &str) -> Vec<StreamChunk> {
    vec![
        StreamChunk::start_text(0),
        StreamChunk::text(0, text),
        StreamChunk::stop(0),
    ]
}

fn tool_reply(id: &str, name: &str, arguments: &str) -> Vec<StreamChunk> {
    vec![
        StreamChunk::start_tool(0, id, name),
        StreamChunk::input_json(0, arguments),
        StreamChunk::stop(0),
    ]
}

fn tool(name: &str) -> Tool {
    Tool::new(
        name,
        format!("the {name} tool"),
        json_schema!({ "type": "object" }),
    )
}

/// A toolbox whose `bash` and `write_file` tools count their runs.
fn toolbox(runs: Arc<AtomicUsize>) -> Toolbox {
    let mut toolbox = Toolbox::new();
    for name in ["bash", "write_file"] {
        let runs = runs.clone();
        toolbox.register(tool(name), move |call: ToolCall| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(format!("ran {}", call.name))
            }
        });
    }
    toolbox
}

fn conversation(
    model: Scripted,
    runs: Arc<AtomicUsize>,
) -> (Conversation<Scripted>, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let facts = SessionFacts {
        provider: "test".into(),
        model: "scripted-1".into(),
        ..Default::default()
    };
    (Conversation::new(model, toolbox(runs), facts, tx), rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::Chunk(chunk) = event {
            chunks.push(chunk);
        }
    }
    chunks
}

fn tool_kinds(chunks: &[StreamChunk]) -> Vec<ToolEventKind> {
    chunks
        .iter()
        .filter_map(|chunk| match chunk {
            StreamChunk::ToolCompletion(event) => Some(event.kind),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn text_turn_completes_in_one_round() {
    let model = Scripted::new([text_reply("Hi there")]);
    let (mut conversation, mut rx) = conversation(model.clone(), Default::default());

    let outcome = conversation.turn("hello", &CancellationToken::new()).await;
    assert_eq!(
        outcome,
        Outcome::Completed {
            rounds: 1,
            message: Message::assistant("Hi there"),
        }
    );
    assert_eq!(
        conversation.history(),
        &[Message::user("hello"), Message::assistant("Hi there")]
    );

    let chunks = drain(&mut rx);
    let text: String = chunks.iter().filter_map(StreamChunk::delta_text).collect();
    assert_eq!(text, "Hi there");

    let requests = model.requests();
    let request = &requests[0];
    assert_eq!(request.messages[0].role, Role::System);
    assert_eq!(request.messages.last(), Some(&Message::user("hello")));
    assert_eq!(request.tools.len(), 2);
}

#[tokio::test]
async fn history_carries_across_turns() {
    let model = Scripted::new([text_reply("one"), text_reply("two")]);
    let (mut conversation, _rx) = conversation(model.clone(), Default::default());
    let cancel = CancellationToken::new();

    conversation.turn("first", &cancel).await;
    conversation.turn("second", &cancel).await;

    let requests = model.requests();
    let messages = &requests[1].messages;
    assert_eq!(
        &messages[1..],
        &[
            Message::user("first"),
            Message::assistant("one"),
            Message::user("second"),
        ]
    );
    assert_eq!(conversation.history().len(), 4);
}

#[tokio::test]
async fn tool_round_trip_with_bypass() {
    let model = Scripted::new([
        tool_reply("call_1", "bash", r#"{"command":"make"}"#),
        text_reply("built"),
    ]);
    let runs = Arc::new(AtomicUsize::new(0));
    let (mut conversation, mut rx) = conversation(model.clone(), runs.clone());
    conversation.gate().set_bypass(true);

    let outcome = conversation.turn("build it", &CancellationToken::new()).await;
    assert!(matches!(outcome, Outcome::Completed { rounds: 2, .. }), "{outcome:?}");
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let history = conversation.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].tool_calls()[0].argument("command"), Some("make"));
    assert_eq!(history[2], Message::tool("call_1", "ran bash", false));
    assert_eq!(history[3], Message::assistant("built"));

    // The second round sees the call and its result, and no repeated user text.
    let requests = model.requests();
    let second = &requests[1].messages;
    assert_eq!(second.last(), Some(&history[2]));
    assert_eq!(
        second.iter().filter(|m| m.role == Role::User).count(),
        1
    );

    let kinds = tool_kinds(&drain(&mut rx));
    assert_eq!(
        kinds,
        vec![
            ToolEventKind::TaskStart,
            ToolEventKind::Start,
            ToolEventKind::Complete
        ]
    );
}

#[tokio::test]
async fn denied_call_reports_to_the_model() {
    let model = Scripted::new([
        tool_reply("call_1", "write_file", r#"{"path":"a.rs","content":"x"}"#),
        text_reply("understood"),
    ]);
    let runs = Arc::new(AtomicUsize::new(0));
    let (mut conversation, mut rx) = conversation(model, runs.clone());

    let ui = tokio::spawn(async move {
        let mut asked = 0;
        while let Some(event) = rx.recv().await {
            if let Event::Permission(request) = event {
                asked += 1;
                request.responder.deny();
            }
        }
        asked
    });

    let outcome = conversation.turn("write a.rs", &CancellationToken::new()).await;
    assert!(matches!(outcome, Outcome::Completed { rounds: 2, .. }), "{outcome:?}");
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(conversation.history()[2], Message::tool("call_1", DENIED, true));

    drop(conversation);
    assert_eq!(ui.await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_tool_becomes_error_result() {
    let model = Scripted::new([
        tool_reply("call_1", "read_file", r#"{"path":"a.rs"}"#),
        text_reply("ok"),
    ]);
    let (mut conversation, _rx) = conversation(model, Default::default());

    conversation.turn("read", &CancellationToken::new()).await;
    let result = &conversation.history()[2];
    assert_eq!(result.role, Role::Tool);
    assert!(result.text().contains("not available"));
}

#[tokio::test]
async fn error_chunk_fails_without_committing() {
    let model = Scripted::new([vec![
        StreamChunk::start_text(0),
        StreamChunk::text(0, "partial"),
        StreamChunk::Error {
            message: "overloaded".into(),
        },
    ]]);
    let (mut conversation, _rx) = conversation(model, Default::default());

    let outcome = conversation.turn("hello", &CancellationToken::new()).await;
    assert_eq!(outcome, Outcome::Failed("overloaded".into()));
    assert!(conversation.history().is_empty());
}

#[tokio::test]
async fn transport_error_fails_without_committing() {
    let model = Scripted::default();
    model.push(
        vec![Err(Error::Status {
            status: 529,
            body: "busy".into(),
        })],
        false,
    );
    let (mut conversation, _rx) = conversation(model, Default::default());

    let Outcome::Failed(message) = conversation.turn("hello", &CancellationToken::new()).await
    else {
        panic!("expected failure");
    };
    assert!(message.contains("529"), "{message}");
    assert!(conversation.history().is_empty());
}

#[tokio::test]
async fn cancel_discards_the_round() {
    let model = Scripted::default();
    model.push(
        vec![Ok(StreamChunk::start_text(0)), Ok(StreamChunk::text(0, "thinking"))],
        true,
    );
    let (mut conversation, mut rx) = conversation(model, Default::default());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if matches!(event, Event::Chunk(ref chunk) if chunk.delta_text().is_some()) {
                    cancel.cancel();
                }
            }
        })
    };

    let outcome = conversation.turn("hello", &cancel).await;
    assert_eq!(outcome, Outcome::Cancelled);
    assert!(conversation.history().is_empty());

    drop(conversation);
    canceller.await.unwrap();
}

#[tokio::test]
async fn cancel_while_awaiting_permission() {
    let model = Scripted::new([tool_reply(
        "call_1",
        "bash",
        r#"{"command":"cargo publish"}"#,
    )]);
    let runs = Arc::new(AtomicUsize::new(0));
    let (mut conversation, mut rx) = conversation(model, runs.clone());
    let cancel = CancellationToken::new();

    let ui = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(event) = rx.recv().await {
                if let Event::Permission(request) = event {
                    held.push(request);
                    cancel.cancel();
                }
            }
            held.len()
        })
    };

    let outcome = conversation.turn("publish", &cancel).await;
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(conversation.history().is_empty());
    assert_eq!(conversation.gate().pending(), 0);

    drop(conversation);
    assert_eq!(ui.await.unwrap(), 1);
}

#[tokio::test]
async fn runaway_tool_loop_stops() {
    let model = Scripted::new(
        (0..MAX_ROUNDS).map(|i| tool_reply(&format!("call_{i}"), "bash", r#"{"command":"make"}"#)),
    );
    let runs = Arc::new(AtomicUsize::new(0));
    let (mut conversation, _rx) = conversation(model, runs.clone());
    conversation.gate().set_bypass(true);

    let outcome = conversation.turn("loop", &CancellationToken::new()).await;
    let Outcome::Failed(message) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("16 rounds"), "{message}");
    assert_eq!(runs.load(Ordering::SeqCst), MAX_ROUNDS);
}
