//! Response and SSE event parsing for the Anthropic Messages API.
//!
//! Anthropic streaming events map one to one onto the normalized chunk
//! vocabulary:
//! - `content_block_start` opens a text or tool_use block
//! - `content_block_delta` carries `text_delta` or `input_json_delta`
//! - `content_block_stop` closes the block
//! - `error` becomes an error chunk
//!
//! `message_start`, `message_delta`, `message_stop` and `ping` carry only
//! metadata and produce nothing.

use compact_str::CompactString;
use kcore::{Response, StopReason, StreamChunk, ToolCall, Usage};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// A raw SSE event from the Anthropic streaming API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Initial message metadata.
    MessageStart { message: MessageMeta },
    /// Begin a content block.
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    /// Incremental content within a block.
    ContentBlockDelta { index: usize, delta: BlockDelta },
    /// End of a content block.
    ContentBlockStop { index: usize },
    /// Final message delta (stop reason + usage).
    MessageDelta { delta: MessageDeltaBody },
    /// End of message.
    MessageStop,
    /// Keep-alive.
    Ping,
    /// Backend failure mid-stream.
    Error { error: ErrorBody },
    /// Catch-all for unknown event types.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct MessageMeta {
    pub id: CompactString,
    pub model: CompactString,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: CompactString,
        name: CompactString,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct MessageDeltaBody {
    pub stop_reason: Option<CompactString>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub message: String,
}

impl Event {
    /// Convert this event into normalized chunks.
    pub fn into_chunks(self) -> Vec<StreamChunk> {
        match self {
            Self::MessageStart { message } => {
                tracing::debug!("anthropic message {} from {}", message.id, message.model);
                Vec::new()
            }
            Self::ContentBlockStart {
                index,
                content_block: BlockStart::Text { text },
            } => {
                let mut chunks = vec![StreamChunk::start_text(index)];
                if !text.is_empty() {
                    chunks.push(StreamChunk::text(index, text));
                }
                chunks
            }
            Self::ContentBlockStart {
                index,
                content_block: BlockStart::ToolUse { id, name },
            } => vec![StreamChunk::start_tool(index, id, name)],
            Self::ContentBlockDelta {
                index,
                delta: BlockDelta::TextDelta { text },
            } => vec![StreamChunk::text(index, text)],
            Self::ContentBlockDelta {
                index,
                delta: BlockDelta::InputJsonDelta { partial_json },
            } => vec![StreamChunk::input_json(index, partial_json)],
            Self::ContentBlockStop { index } => vec![StreamChunk::stop(index)],
            Self::MessageDelta { delta } => {
                tracing::debug!("anthropic stop reason: {:?}", delta.stop_reason);
                Vec::new()
            }
            Self::Error { error } => vec![StreamChunk::Error {
                message: format!("{}: {}", error.kind, error.message),
            }],
            Self::ContentBlockStart { .. }
            | Self::ContentBlockDelta { .. }
            | Self::MessageStop
            | Self::Ping
            | Self::Unknown => Vec::new(),
        }
    }
}

/// Raw Anthropic non-streaming response.
#[derive(Debug, Deserialize)]
pub struct Raw {
    id: CompactString,
    model: CompactString,
    content: Vec<RawBlock>,
    stop_reason: Option<CompactString>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: CompactString,
        name: CompactString,
        #[serde(default)]
        input: Map<String, Value>,
    },
    #[serde(other)]
    Other,
}

impl Raw {
    /// Convert to the unified response.
    pub fn into_response(self, latency: Duration) -> Response {
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in self.content {
            match block {
                RawBlock::Text { text } => {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(&text);
                }
                RawBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input))
                }
                RawBlock::Other => {}
            }
        }

        Response {
            id: self.id,
            model: self.model,
            content,
            tool_calls,
            stop_reason: self
                .stop_reason
                .as_deref()
                .map(StopReason::parse)
                .unwrap_or_default(),
            usage: self.usage,
            latency,
        }
    }
}
