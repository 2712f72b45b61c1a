//! Generate response type.

use crate::model::{ContentBlock, Message, ToolCall};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A complete, non-streamed response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Response {
    /// Backend response id.
    pub id: CompactString,

    /// Model that produced the response.
    pub model: CompactString,

    /// Final text.
    pub content: String,

    /// Tool calls requested by the model.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Why generation stopped.
    pub stop_reason: StopReason,

    /// Token accounting reported by the backend.
    #[serde(default)]
    pub usage: Usage,

    /// Wall-clock time of the call.
    #[serde(default)]
    pub latency: Duration,
}

impl Response {
    /// The response as an assistant message.
    pub fn message(&self) -> Message {
        let mut blocks = Vec::with_capacity(self.tool_calls.len() + 1);
        if !self.content.is_empty() {
            blocks.push(ContentBlock::Text {
                text: self.content.clone(),
            });
        }
        blocks.extend(self.tool_calls.iter().map(|call| ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        }));
        Message::assistant_blocks(blocks)
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn.
    #[default]
    EndTurn,
    /// Output token cap reached.
    MaxTokens,
    /// The model wants tool results.
    ToolUse,
    /// A stop sequence matched.
    StopSequence,
    /// Anything else the backend reports.
    Other,
}

impl StopReason {
    /// Map a backend stop or finish reason onto the shared set.
    pub fn parse(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop" | "STOP" => Self::EndTurn,
            "max_tokens" | "length" | "MAX_TOKENS" => Self::MaxTokens,
            "tool_use" | "tool_calls" | "function_call" => Self::ToolUse,
            "stop_sequence" => Self::StopSequence,
            _ => Self::Other,
        }
    }
}

/// Token accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: u32,
    /// Completion tokens.
    pub output_tokens: u32,
}
