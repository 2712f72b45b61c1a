//! Ollama response lines and their translation into block chunks.
//!
//! Each NDJSON line carries a message fragment. Tool calls arrive complete,
//! without ids, so every call gets a generated id and is emitted as a full
//! start, delta, stop sequence.

use crate::tool_id;
use compact_str::CompactString;
use kcore::{Response, StopReason, StreamChunk, ToolCall, Usage};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// One response line, streamed or final.
#[derive(Debug, Default, Deserialize)]
pub struct Line {
    #[serde(default)]
    pub model: CompactString,
    #[serde(default)]
    pub message: Option<LineMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<CompactString>,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LineMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<LineToolCall>,
}

#[derive(Debug, Deserialize)]
pub struct LineToolCall {
    pub function: LineFunction,
}

#[derive(Debug, Deserialize)]
pub struct LineFunction {
    pub name: CompactString,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Stateful translation of response lines into block chunks.
#[derive(Debug, Default)]
pub struct Decoder {
    next: usize,
    text: Option<usize>,
}

impl Decoder {
    /// Translate one line.
    pub fn accept(&mut self, line: Line) -> Vec<StreamChunk> {
        let mut out = Vec::new();
        if let Some(message) = line.error {
            out.push(StreamChunk::Error { message });
            return out;
        }

        if let Some(message) = line.message {
            if !message.content.is_empty() {
                let index = match self.text {
                    Some(index) => index,
                    None => {
                        let index = self.open();
                        self.text = Some(index);
                        out.push(StreamChunk::start_text(index));
                        index
                    }
                };
                out.push(StreamChunk::text(index, message.content));
            }

            for call in message.tool_calls {
                if let Some(text) = self.text.take() {
                    out.push(StreamChunk::stop(text));
                }
                let index = self.open();
                out.push(StreamChunk::start_tool(index, tool_id(), call.function.name));
                out.push(StreamChunk::input_json(
                    index,
                    Value::Object(call.function.arguments).to_string(),
                ));
                out.push(StreamChunk::stop(index));
            }
        }

        if line.done {
            out.extend(self.finish());
        }
        out
    }

    /// Close the open text block, if any.
    pub fn finish(&mut self) -> Vec<StreamChunk> {
        self.text.take().map(StreamChunk::stop).into_iter().collect()
    }

    fn open(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }
}

impl Line {
    /// Convert a final non-streamed line to the unified response.
    pub fn into_response(self, latency: Duration) -> Response {
        let message = self.message.unwrap_or_default();
        Response {
            id: tool_id(),
            model: self.model,
            content: message.content,
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|call| ToolCall::new(tool_id(), call.function.name, call.function.arguments))
                .collect(),
            stop_reason: self
                .done_reason
                .as_deref()
                .map(StopReason::parse)
                .unwrap_or_default(),
            usage: Usage {
                input_tokens: self.prompt_eval_count,
                output_tokens: self.eval_count,
            },
            latency,
        }
    }
}
