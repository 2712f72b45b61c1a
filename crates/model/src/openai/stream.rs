//! Chat completions responses and the delta translator.
//!
//! OpenAI-compatible streams carry flat deltas with no block boundaries.
//! [`Translator`] assigns block indices, opens a block on the first delta
//! for it, and closes everything on `finish_reason` or `[DONE]`.

use compact_str::{CompactString, format_compact};
use kcore::{Response, StopReason, StreamChunk, ToolCall, Usage};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, time::Duration};

/// One streamed chat completions chunk.
#[derive(Debug, Default, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<CompactString>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<CompactString>,
    #[serde(default)]
    pub function: FunctionDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<CompactString>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
}

/// Stateful translation of flat deltas into block chunks.
#[derive(Debug, Default)]
pub struct Translator {
    next: usize,
    text: Option<usize>,
    tools: BTreeMap<u32, usize>,
}

impl Translator {
    /// Translate one chunk.
    pub fn accept(&mut self, chunk: Chunk) -> Vec<StreamChunk> {
        let mut out = Vec::new();
        if let Some(error) = chunk.error {
            out.push(StreamChunk::Error {
                message: error.message,
            });
            return out;
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content
                && !text.is_empty()
            {
                let index = match self.text {
                    Some(index) => index,
                    None => {
                        let index = self.open();
                        self.text = Some(index);
                        out.push(StreamChunk::start_text(index));
                        index
                    }
                };
                out.push(StreamChunk::text(index, text));
            }

            for call in choice.delta.tool_calls {
                let index = match self.tools.get(&call.index) {
                    Some(index) => *index,
                    None => {
                        if let Some(text) = self.text.take() {
                            out.push(StreamChunk::stop(text));
                        }
                        let index = self.open();
                        self.tools.insert(call.index, index);
                        let id = call
                            .id
                            .clone()
                            .unwrap_or_else(|| format_compact!("call_{}", ulid::Ulid::new()));
                        let name = call.function.name.clone().unwrap_or_default();
                        out.push(StreamChunk::start_tool(index, id, name));
                        index
                    }
                };
                if let Some(arguments) = call.function.arguments
                    && !arguments.is_empty()
                {
                    out.push(StreamChunk::input_json(index, arguments));
                }
            }

            if let Some(reason) = choice.finish_reason {
                tracing::debug!("finish reason: {reason}");
                out.extend(self.finish());
            }
        }
        out
    }

    /// Close every open block.
    pub fn finish(&mut self) -> Vec<StreamChunk> {
        let mut out = Vec::new();
        if let Some(text) = self.text.take() {
            out.push(StreamChunk::stop(text));
        }
        out.extend(
            std::mem::take(&mut self.tools)
                .into_values()
                .map(StreamChunk::stop),
        );
        out
    }

    fn open(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// Raw non-streaming chat completions response.
#[derive(Debug, Deserialize)]
pub struct Raw {
    #[serde(default)]
    id: CompactString,
    #[serde(default)]
    model: CompactString,
    choices: Vec<RawChoice>,
    #[serde(default)]
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    message: RawMessage,
    #[serde(default)]
    finish_reason: Option<CompactString>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    id: CompactString,
    function: RawFunction,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: CompactString,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct RawUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl Raw {
    /// Convert to the unified response, reading the first choice.
    pub fn into_response(self, latency: Duration) -> Response {
        let usage = self
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let Some(choice) = self.choices.into_iter().next() else {
            return Response {
                id: self.id,
                model: self.model,
                usage,
                latency,
                ..Default::default()
            };
        };

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let input = parse_arguments(&call.function.arguments);
                ToolCall::new(call.id, call.function.name, input)
            })
            .collect();
        Response {
            id: self.id,
            model: self.model,
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            stop_reason: choice
                .finish_reason
                .as_deref()
                .map(StopReason::parse)
                .unwrap_or_default(),
            usage,
            latency,
        }
    }
}

fn parse_arguments(arguments: &str) -> Map<String, Value> {
    if arguments.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str(arguments) {
        Ok(Value::Object(map)) => map,
        _ => {
            tracing::warn!("tool arguments are not a JSON object: {arguments}");
            Map::new()
        }
    }
}
