//! Tests for the stream normalizer.

use futures_util::{StreamExt, stream};
use kcore::{
    Assembler, ChunkReceiver, ChunkStream, ContentBlock, Error, Response, StreamChunk, ToolCall,
    synthesize,
};
use serde_json::{Map, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn deltas(chunks: &[StreamChunk]) -> Vec<&str> {
    chunks.iter().filter_map(StreamChunk::delta_text).collect()
}

#[test]
fn synthesize_splits_on_spaces() {
    let response = Response {
        content: "Hello world foo".into(),
        ..Default::default()
    };
    let chunks = synthesize(&response);
    assert_eq!(deltas(&chunks), ["Hello ", "world ", "foo"]);
    assert_eq!(chunks.first(), Some(&StreamChunk::start_text(0)));
    assert_eq!(chunks.last(), Some(&StreamChunk::stop(0)));
    assert_eq!(deltas(&chunks).concat(), "Hello world foo");
}

#[test]
fn synthesize_emits_tool_calls_after_text() {
    let mut input = Map::new();
    input.insert("path".into(), json!("a.rs"));
    let response = Response {
        content: "Reading".into(),
        tool_calls: vec![ToolCall::new("c1", "read_file", input)],
        ..Default::default()
    };
    let chunks = synthesize(&response);
    let Some(StreamChunk::ContentBlockStop {
        index,
        tool_call: Some(call),
    }) = chunks.last()
    else {
        panic!("expected tool stop, got {chunks:?}");
    };
    assert_eq!(*index, 1);
    assert_eq!(call.name, "read_file");

    let mut asm = Assembler::new();
    let calls: Vec<_> = chunks.iter().filter_map(|c| asm.accept(c)).collect();
    assert_eq!(calls.len(), 1);
    let msg = asm.finish();
    assert_eq!(msg.text(), "Reading");
    assert_eq!(msg.tool_calls(), calls);
}

#[test]
fn assembler_accumulates_json_fragments() {
    let mut asm = Assembler::new();
    let chunks = [
        StreamChunk::start_text(0),
        StreamChunk::text(0, "Let me "),
        StreamChunk::text(0, "check."),
        StreamChunk::stop(0),
        StreamChunk::start_tool(1, "toolu_1", "bash"),
        StreamChunk::input_json(1, r#"{"comm"#),
        StreamChunk::input_json(1, r#"and": "ls -la"}"#),
    ];
    for chunk in &chunks {
        assert!(asm.accept(chunk).is_none());
    }
    assert_eq!(asm.text(), "Let me check.");

    let call = asm.accept(&StreamChunk::stop(1)).expect("tool call at stop");
    assert_eq!(call.id, "toolu_1");
    assert_eq!(call.argument("command"), Some("ls -la"));

    let msg = asm.finish();
    let blocks = msg.blocks();
    assert!(matches!(blocks[0], ContentBlock::Text { .. }));
    assert!(matches!(blocks[1], ContentBlock::ToolUse { .. }));
}

#[test]
fn assembler_empty_arguments_parse_as_object() {
    let mut asm = Assembler::new();
    asm.accept(&StreamChunk::start_tool(0, "t", "list_files"));
    let call = asm.accept(&StreamChunk::stop(0)).unwrap();
    assert!(call.input.is_empty());
}

#[test]
fn assembler_ignores_unknown_tool_delta() {
    let mut asm = Assembler::new();
    assert!(asm.accept(&StreamChunk::input_json(4, "{}")).is_none());
    assert!(asm.accept(&StreamChunk::stop(4)).is_none());
    assert!(asm.finish().is_empty());
}

#[test]
fn assembler_drops_unterminated_tool() {
    let mut asm = Assembler::new();
    asm.accept(&StreamChunk::text(0, "partial"));
    asm.accept(&StreamChunk::start_tool(1, "t", "bash"));
    let msg = asm.finish();
    assert_eq!(msg.text(), "partial");
    assert!(!msg.has_tool_use());
}

#[test]
fn chunk_wire_shape() {
    let value = serde_json::to_value(StreamChunk::text(0, "hi")).unwrap();
    assert_eq!(
        value,
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text", "text": "hi"}})
    );
}

#[tokio::test]
async fn receiver_forwards_in_order_and_skips_empty() {
    let chunks: ChunkStream = stream::iter(vec![
        Ok(StreamChunk::start_text(0)),
        Ok(StreamChunk::text(0, "")),
        Ok(StreamChunk::text(0, "a")),
        Ok(StreamChunk::text(0, "b")),
        Ok(StreamChunk::stop(0)),
    ])
    .boxed();
    let mut rx = ChunkReceiver::spawn(chunks, CancellationToken::new());
    let mut got = Vec::new();
    while let Some(chunk) = rx.recv().await {
        got.push(chunk.unwrap());
    }
    assert_eq!(
        got,
        [
            StreamChunk::start_text(0),
            StreamChunk::text(0, "a"),
            StreamChunk::text(0, "b"),
            StreamChunk::stop(0),
        ]
    );
}

#[tokio::test]
async fn receiver_stops_after_cancel() {
    let chunks: ChunkStream = async_stream::stream! {
        let mut i = 0;
        loop {
            yield Ok(StreamChunk::text(0, format!("{i} ")));
            i += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    .boxed();
    let cancel = CancellationToken::new();
    let mut rx = ChunkReceiver::spawn(chunks, cancel.clone());
    assert!(rx.recv().await.is_some());

    cancel.cancel();
    let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("closed within bound");
    assert!(next.is_none());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn receiver_turns_panic_into_error_chunk() {
    let chunks: ChunkStream = async_stream::stream! {
        yield Ok(StreamChunk::text(0, "before"));
        panic!("boom");
    }
    .boxed();
    let mut rx = ChunkReceiver::spawn(chunks, CancellationToken::new());
    assert_eq!(rx.recv().await.unwrap().unwrap(), StreamChunk::text(0, "before"));
    match rx.recv().await {
        Some(Ok(StreamChunk::Error { message })) => assert!(message.contains("boom")),
        other => panic!("expected error chunk, got {other:?}"),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn receiver_forwards_error_and_closes() {
    let chunks: ChunkStream = stream::iter(vec![
        Err(Error::Transport("reset".into())),
        Ok(StreamChunk::text(0, "never")),
    ])
    .boxed();
    let mut rx = ChunkReceiver::spawn(chunks, CancellationToken::new());
    assert!(matches!(rx.recv().await, Some(Err(Error::Transport(_)))));
    assert!(rx.recv().await.is_none());
}
