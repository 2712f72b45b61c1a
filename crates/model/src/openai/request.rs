//! Request body for OpenAI-compatible chat completions.

use crate::Catalog;
use compact_str::CompactString;
use kcore::{Content, ContentBlock, Message, Role, Tool, ToolChoice};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashSet;

/// The request body for chat completions.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: CompactString,
    /// The messages array.
    pub messages: Vec<Value>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    /// Tool choice control.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl Request {
    /// Convert a generic request.
    pub fn new(request: &kcore::Request, catalog: &Catalog) -> Self {
        Self {
            model: catalog.model(request).into(),
            messages: wire_messages(&request.messages),
            max_tokens: catalog.max_tokens(request),
            temperature: request.temperature,
            tools: request.tools.iter().map(wire_tool).collect(),
            tool_choice: request.tool_choice.as_ref().map(wire_tool_choice),
            stream: None,
        }
    }

    /// Enable streaming for the request.
    pub fn stream(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

/// Render a message list. Tool results become one `tool` message each; a
/// result whose call is not earlier in the list degrades to plain text.
pub fn wire_messages(messages: &[Message]) -> Vec<Value> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .flat_map(|message| wire_message(message, &mut seen))
        .collect()
}

fn wire_message(message: &Message, seen: &mut HashSet<CompactString>) -> Vec<Value> {
    let role = message.role.as_str();
    let blocks = match &message.content {
        Content::Text(text) if message.role == Role::Tool => {
            return match &message.tool_call_id {
                Some(id) if seen.contains(id) => vec![json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": text,
                })],
                _ => vec![json!({ "role": "user", "content": format!("Tool result: {text}") })],
            };
        }
        Content::Text(text) => return vec![json!({ "role": role, "content": text })],
        Content::Blocks(blocks) => blocks,
    };

    let mut out = Vec::new();
    let mut parts = Vec::new();
    let mut calls = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text { text } => parts.push(json!({"type": "text", "text": text})),
            ContentBlock::Image {
                media_type, data, ..
            } => parts.push(json!({
                "type": "image_url",
                "image_url": {"url": format!("data:{media_type};base64,{data}")},
            })),
            ContentBlock::ToolUse { id, name, input } => {
                seen.insert(id.clone());
                calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": Value::Object(input.clone()).to_string(),
                    },
                }))
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } if seen.contains(tool_use_id) => out.push(json!({
                "role": "tool",
                "tool_call_id": tool_use_id,
                "content": content,
            })),
            ContentBlock::ToolResult { content, .. } => {
                parts.push(json!({"type": "text", "text": format!("Tool result: {content}")}))
            }
        }
    }

    if parts.is_empty() && calls.is_empty() {
        return out;
    }

    let only_text = parts.iter().all(|p| p["type"] == "text");
    let content = if parts.is_empty() {
        Value::Null
    } else if only_text {
        let texts: Vec<&str> = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        Value::String(texts.join("\n"))
    } else {
        Value::Array(parts)
    };
    let role = match message.role {
        Role::Tool if calls.is_empty() => "user",
        Role::Tool => "assistant",
        _ => role,
    };
    let mut wire = json!({ "role": role, "content": content });
    if !calls.is_empty() {
        wire["tool_calls"] = Value::Array(calls);
    }
    if role == "user" {
        out.push(wire);
    } else {
        out.insert(0, wire);
    }
    out
}

fn wire_tool(tool: &Tool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        },
    })
}

fn wire_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::None => json!("none"),
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
    }
}
