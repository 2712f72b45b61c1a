//! Tests for the Anthropic wire format.

use kcore::{Assembler, ContentBlock, Message, Request, StopReason, StreamChunk, ToolChoice};
use kestrel_model::{
    Catalog,
    claude::{self, Event, Raw},
};
use serde_json::{Map, Value, json};
use std::time::Duration;

fn wire(request: &Request) -> Value {
    let catalog = Catalog::new(claude::DEFAULT_MODEL);
    serde_json::to_value(claude::Request::new(request, &catalog)).unwrap()
}

fn path(p: &str) -> Map<String, Value> {
    let mut input = Map::new();
    input.insert("path".into(), json!(p));
    input
}

#[test]
fn system_moves_out_of_band() {
    let request = Request::default().with_messages(vec![
        Message::system("be brief"),
        Message::user("hi"),
    ]);
    let body = wire(&request);
    assert_eq!(body["system"], "be brief");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["model"], claude::DEFAULT_MODEL);
    assert_eq!(body["max_tokens"], 4096);
    assert!(body.get("stream").is_none());
}

#[test]
fn tool_results_ride_in_user_turns() {
    let request = Request::default().with_messages(vec![
        Message::user("read a.rs"),
        Message::assistant_blocks(vec![
            ContentBlock::Text { text: "ok".into() },
            ContentBlock::ToolUse {
                id: "toolu_1".into(),
                name: "read_file".into(),
                input: path("a.rs"),
            },
        ]),
        Message::tool("toolu_1", "fn main() {}", false),
        Message::user("thanks"),
    ]);
    let body = wire(&request);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"][1]["type"], "tool_use");
    assert_eq!(messages[1]["content"][1]["input"]["path"], "a.rs");

    let last = &messages[2];
    assert_eq!(last["role"], "user");
    assert_eq!(last["content"][0]["type"], "tool_result");
    assert_eq!(last["content"][0]["tool_use_id"], "toolu_1");
    assert_eq!(last["content"][0]["is_error"], false);
    assert_eq!(last["content"][1]["text"], "thanks");
}

#[test]
fn orphan_tool_result_degrades_to_text() {
    let request = Request::default().with_messages(vec![
        Message::user("hi"),
        Message::tool("gone", "stale output", false),
    ]);
    let body = wire(&request);
    let content = &body["messages"][0]["content"];
    assert_eq!(content[0]["text"], "hi");
    assert_eq!(content[1]["type"], "text");
    assert_eq!(content[1]["text"], "Tool result: stale output");
}

#[test]
fn empty_history_gets_placeholder_turn() {
    let body = wire(&Request::default().with_messages(vec![Message::system("s")]));
    assert_eq!(body["messages"][0]["content"], "Hello");
}

#[test]
fn request_overrides_and_streaming() {
    let request = Request::new("claude-opus-4-1")
        .with_messages(vec![Message::user("hi")])
        .with_max_tokens(256)
        .with_temperature(0.5)
        .with_tool_choice(ToolChoice::Required);
    let catalog = Catalog::new(claude::DEFAULT_MODEL);
    let body = serde_json::to_value(claude::Request::new(&request, &catalog).stream()).unwrap();
    assert_eq!(body["model"], "claude-opus-4-1");
    assert_eq!(body["max_tokens"], 256);
    assert_eq!(body["temperature"], 0.5);
    assert_eq!(body["stream"], true);
    assert_eq!(body["tool_choice"]["type"], "any");
}

#[test]
fn catalog_cap_applies_when_request_has_none() {
    let catalog = Catalog::new(claude::DEFAULT_MODEL).with_max_tokens(Some(1024));
    let request = Request::default().with_messages(vec![Message::user("hi")]);
    let body = serde_json::to_value(claude::Request::new(&request, &catalog)).unwrap();
    assert_eq!(body["max_tokens"], 1024);
}

fn events(lines: &[&str]) -> Vec<StreamChunk> {
    lines
        .iter()
        .flat_map(|line| serde_json::from_str::<Event>(line).unwrap().into_chunks())
        .collect()
}

#[test]
fn events_map_to_chunks() {
    let chunks = events(&[
        r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-sonnet-4-5"}}"#,
        r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
        r#"{"type":"ping"}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        r#"{"type":"content_block_stop","index":0}"#,
        r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"read_file","input":{}}}"#,
        r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"path\":"}}"#,
        r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"a.rs\"}"}}"#,
        r#"{"type":"content_block_stop","index":1}"#,
        r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":9}}"#,
        r#"{"type":"message_stop"}"#,
    ]);
    assert_eq!(chunks.len(), 7);
    assert_eq!(chunks[0], StreamChunk::start_text(0));
    assert_eq!(chunks[1], StreamChunk::text(0, "Hi"));

    let mut assembler = Assembler::new();
    let calls: Vec<_> = chunks.iter().filter_map(|c| assembler.accept(c)).collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "toolu_1");
    assert_eq!(calls[0].argument("path"), Some("a.rs"));
    assert_eq!(assembler.text(), "Hi");
}

#[test]
fn error_event_becomes_error_chunk() {
    let chunks = events(&[
        r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
    ]);
    assert_eq!(
        chunks,
        vec![StreamChunk::Error {
            message: "overloaded_error: Overloaded".into()
        }]
    );
}

#[test]
fn unknown_events_are_ignored() {
    assert!(events(&[r#"{"type":"brand_new_event","data":1}"#]).is_empty());
}

#[test]
fn raw_response_converts() {
    let raw: Raw = serde_json::from_value(json!({
        "id": "msg_1",
        "model": "claude-sonnet-4-5",
        "content": [
            {"type": "text", "text": "Reading."},
            {"type": "tool_use", "id": "toolu_1", "name": "read_file", "input": {"path": "a.rs"}}
        ],
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 12, "output_tokens": 7}
    }))
    .unwrap();
    let response = raw.into_response(Duration::from_millis(5));
    assert_eq!(response.content, "Reading.");
    assert_eq!(response.tool_calls[0].name, "read_file");
    assert_eq!(response.stop_reason, StopReason::ToolUse);
    assert_eq!(response.usage.input_tokens, 12);
    assert_eq!(response.latency, Duration::from_millis(5));
}
