//! Request body for the Ollama chat API.

use crate::Catalog;
use compact_str::CompactString;
use kcore::{Content, ContentBlock, Message, Role, Tool};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashSet;

/// The request body for `/api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: CompactString,
    /// The messages array.
    pub messages: Vec<Value>,
    /// Whether to stream newline-delimited JSON.
    pub stream: bool,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    /// Sampling options.
    pub options: Options,
}

/// Model options.
#[derive(Debug, Clone, Serialize)]
pub struct Options {
    /// Maximum tokens to generate.
    pub num_predict: u32,
    /// Temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Request {
    /// Convert a generic request. Ollama has no tool-choice control, so the
    /// hint is dropped.
    pub fn new(request: &kcore::Request, catalog: &Catalog) -> Self {
        Self {
            model: catalog.model(request).into(),
            messages: wire_messages(&request.messages),
            stream: false,
            tools: request
                .tools
                .iter()
                .map(|tool: &Tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        },
                    })
                })
                .collect(),
            options: Options {
                num_predict: catalog.max_tokens(request),
                temperature: request.temperature,
            },
        }
    }

    /// Enable streaming for the request.
    pub fn stream(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Render a message list. A tool result whose call is not earlier in the
/// list degrades to plain user text.
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
                Some(id) if seen.contains(id) => vec![json!({"role": "tool", "content": text})],
                _ => vec![json!({ "role": "user", "content": format!("Tool result: {text}") })],
            };
        }
        Content::Text(text) => return vec![json!({ "role": role, "content": text })],
        Content::Blocks(blocks) => blocks,
    };

    let mut out = Vec::new();
    let mut text = Vec::new();
    let mut images = Vec::new();
    let mut calls = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text { text: t } => text.push(t.clone()),
            ContentBlock::Image { data, .. } => images.push(data.clone()),
            ContentBlock::ToolUse { id, name, input } => {
                seen.insert(id.clone());
                calls.push(json!({"function": {"name": name, "arguments": input}}))
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } if seen.contains(tool_use_id) => {
                out.push(json!({"role": "tool", "content": content}))
            }
            ContentBlock::ToolResult { content, .. } => text.push(format!("Tool result: {content}")),
        }
    }

    if text.is_empty() && images.is_empty() && calls.is_empty() {
        return out;
    }
    let role = match message.role {
        Role::Tool if calls.is_empty() => "user",
        Role::Tool => "assistant",
        _ => role,
    };
    let mut wire = json!({ "role": role, "content": text.join("\n") });
    if !images.is_empty() {
        wire["images"] = json!(images);
    }
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
