//! The normalized streaming vocabulary and its state machines.
//!
//! Every adapter emits [`StreamChunk`]s: block start, delta, stop, plus
//! out-of-band tool lifecycle events and errors. [`ChunkReceiver`] drives an
//! adapter stream on its own task, [`Assembler`] folds chunks back into a
//! message, and [`synthesize`] fakes a stream for non-streaming backends.

use crate::{
    Error, Result,
    model::{ChunkStream, ContentBlock, Message, Response, ToolCall},
};
use compact_str::CompactString;
use futures_util::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, panic::AssertUnwindSafe};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bound of the per-stream chunk channel.
pub const CHANNEL_CAPACITY: usize = 32;

/// One incremental unit of a normalized streaming response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// A content block opens.
    ContentBlockStart { index: usize, block: BlockStart },
    /// Incremental content for an open block.
    ContentBlockDelta { index: usize, delta: BlockDelta },
    /// A content block closes. A finalized tool call may ride on the stop.
    ContentBlockStop {
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCall>,
    },
    /// Tool execution lifecycle, emitted by the orchestrator.
    ToolCompletion(ToolEvent),
    /// The backend or the stream task failed.
    Error { message: String },
}

impl StreamChunk {
    /// A text delta for block `index`.
    pub fn text(index: usize, text: impl Into<String>) -> Self {
        Self::ContentBlockDelta {
            index,
            delta: BlockDelta::Text { text: text.into() },
        }
    }

    /// A tool argument fragment for block `index`.
    pub fn input_json(index: usize, partial_json: impl Into<String>) -> Self {
        Self::ContentBlockDelta {
            index,
            delta: BlockDelta::InputJson {
                partial_json: partial_json.into(),
            },
        }
    }

    /// Start of a text block.
    pub fn start_text(index: usize) -> Self {
        Self::ContentBlockStart {
            index,
            block: BlockStart::Text,
        }
    }

    /// Start of a tool-use block.
    pub fn start_tool(
        index: usize,
        id: impl Into<CompactString>,
        name: impl Into<CompactString>,
    ) -> Self {
        Self::ContentBlockStart {
            index,
            block: BlockStart::ToolUse {
                id: id.into(),
                name: name.into(),
            },
        }
    }

    /// Stop of block `index`.
    pub fn stop(index: usize) -> Self {
        Self::ContentBlockStop {
            index,
            tool_call: None,
        }
    }

    /// The text of a text delta.
    pub fn delta_text(&self) -> Option<&str> {
        match self {
            Self::ContentBlockDelta {
                delta: BlockDelta::Text { text },
                ..
            } => Some(text),
            _ => None,
        }
    }

    /// Whether the chunk carries nothing worth forwarding.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::ContentBlockDelta { delta, .. } => match delta {
                BlockDelta::Text { text } => text.is_empty(),
                BlockDelta::InputJson { partial_json } => partial_json.is_empty(),
            },
            _ => false,
        }
    }
}

/// What kind of block a start chunk opens.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    /// Assistant text.
    Text,
    /// A tool call; arguments follow as JSON fragments.
    ToolUse {
        id: CompactString,
        name: CompactString,
    },
}

/// Incremental block content.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Text appended to a text block.
    Text { text: String },
    /// JSON fragment appended to a tool call's arguments.
    InputJson { partial_json: String },
}

/// Tool lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEventKind {
    /// A group of tool calls is about to run.
    TaskStart,
    /// A tool started executing.
    Start,
    /// A tool failed or was denied.
    Error,
    /// A tool finished.
    Complete,
}

/// Out-of-band tool execution event for the UI.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolEvent {
    /// Lifecycle stage.
    pub kind: ToolEventKind,
    /// Tool name.
    pub name: CompactString,
    /// Call arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Result text, on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error text, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Grouping label for UI rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<CompactString>,
}

impl ToolEvent {
    /// An event of `kind` for `call`.
    pub fn new(kind: ToolEventKind, call: &ToolCall) -> Self {
        Self {
            kind,
            name: call.name.clone(),
            arguments: call.input.clone(),
            result: None,
            error: None,
            group: None,
        }
    }

    /// Attach a result.
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Attach an error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach a group label.
    pub fn with_group(mut self, group: impl Into<CompactString>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Receiving half of a spawned adapter stream.
///
/// The producer task owns the adapter stream. It exits, dropping the stream
/// and with it any HTTP connection, once the consumer goes away or the
/// token is cancelled.
pub struct ChunkReceiver {
    rx: mpsc::Receiver<Result<StreamChunk>>,
    cancel: CancellationToken,
}

impl ChunkReceiver {
    /// Spawn a task forwarding `stream` into a bounded channel.
    pub fn spawn(mut stream: ChunkStream, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = AssertUnwindSafe(stream.next()).catch_unwind() => next,
                };

                let (item, last) = match next {
                    Ok(Some(Ok(chunk))) if chunk.is_empty() => continue,
                    Ok(Some(Ok(chunk))) => (Ok(chunk), false),
                    Ok(Some(Err(e))) => (Err(e), true),
                    Ok(None) => break,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!("stream task panicked: {message}");
                        (
                            Ok(StreamChunk::Error {
                                message: Error::Panicked(message).to_string(),
                            }),
                            true,
                        )
                    }
                };

                let sent = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    sent = tx.send(item) => sent,
                };
                if sent.is_err() || last {
                    break;
                }
            }
            tracing::debug!("stream task finished");
        });

        Self { rx, cancel }
    }

    /// Receive the next chunk.
    ///
    /// Returns `None` when the stream is exhausted or the token has been
    /// cancelled; nothing is delivered after cancellation is observed.
    pub async fn recv(&mut self) -> Option<Result<StreamChunk>> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.rx.close();
                None
            }
            item = self.rx.recv() => item,
        }
    }

    /// Whether the stream was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Fake a stream from a complete response.
///
/// The text is split after every space, so concatenating the deltas gives
/// back the original text. Each tool call follows as a stop chunk carrying
/// the finalized call.
pub fn synthesize(response: &Response) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    let mut index = 0;
    if !response.content.is_empty() {
        chunks.push(StreamChunk::start_text(index));
        chunks.extend(
            response
                .content
                .split_inclusive(' ')
                .map(|word| StreamChunk::text(index, word)),
        );
        chunks.push(StreamChunk::stop(index));
        index += 1;
    }

    for call in &response.tool_calls {
        chunks.push(StreamChunk::ContentBlockStop {
            index,
            tool_call: Some(call.clone()),
        });
        index += 1;
    }
    chunks
}

/// A block still receiving deltas.
#[derive(Debug)]
enum Partial {
    Text(String),
    Tool {
        id: CompactString,
        name: CompactString,
        json: String,
    },
}

/// Folds stream chunks into the assistant message.
///
/// Blocks are keyed by index and kept in index order. A tool call is
/// finalized at its stop chunk.
#[derive(Debug, Default)]
pub struct Assembler {
    open: BTreeMap<usize, Partial>,
    done: BTreeMap<usize, ContentBlock>,
}

impl Assembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a chunk, returning the tool call it finalizes, if any.
    pub fn accept(&mut self, chunk: &StreamChunk) -> Option<ToolCall> {
        match chunk {
            StreamChunk::ContentBlockStart { index, block } => {
                let partial = match block {
                    BlockStart::Text => Partial::Text(String::new()),
                    BlockStart::ToolUse { id, name } => Partial::Tool {
                        id: id.clone(),
                        name: name.clone(),
                        json: String::new(),
                    },
                };
                self.open.insert(*index, partial);
                None
            }
            StreamChunk::ContentBlockDelta { index, delta } => {
                match (self.open.get_mut(index), delta) {
                    (Some(Partial::Text(buf)), BlockDelta::Text { text }) => buf.push_str(text),
                    (Some(Partial::Tool { json, .. }), BlockDelta::InputJson { partial_json }) => {
                        json.push_str(partial_json)
                    }
                    (None, BlockDelta::Text { text }) => {
                        self.open.insert(*index, Partial::Text(text.clone()));
                    }
                    (_, delta) => {
                        tracing::warn!("ignoring delta for unknown block {index}: {delta:?}");
                    }
                }
                None
            }
            StreamChunk::ContentBlockStop { index, tool_call } => {
                let partial = self.open.remove(index);
                if let Some(call) = tool_call {
                    self.finish_call(*index, call.clone());
                    return Some(call.clone());
                }

                match partial? {
                    Partial::Text(text) => {
                        self.done.insert(*index, ContentBlock::Text { text });
                        None
                    }
                    Partial::Tool { id, name, json } => {
                        let call = ToolCall::new(id, name, parse_arguments(&json));
                        self.finish_call(*index, call.clone());
                        Some(call)
                    }
                }
            }
            StreamChunk::ToolCompletion(_) | StreamChunk::Error { .. } => None,
        }
    }

    fn finish_call(&mut self, index: usize, call: ToolCall) {
        self.done.insert(
            index,
            ContentBlock::ToolUse {
                id: call.id,
                name: call.name,
                input: call.input,
            },
        );
    }

    /// All text received so far, in block order.
    pub fn text(&self) -> String {
        let mut blocks: BTreeMap<usize, &str> = BTreeMap::new();
        for (index, block) in &self.done {
            if let ContentBlock::Text { text } = block {
                blocks.insert(*index, text);
            }
        }
        for (index, partial) in &self.open {
            if let Partial::Text(text) = partial {
                blocks.insert(*index, text);
            }
        }
        blocks.into_values().collect()
    }

    /// Tool calls finalized so far, in block order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.done
            .values()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::new(id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Close open text blocks and build the assistant message.
    ///
    /// Tool blocks that never saw their stop are dropped.
    pub fn finish(mut self) -> Message {
        for (index, partial) in std::mem::take(&mut self.open) {
            match partial {
                Partial::Text(text) => {
                    self.done.insert(index, ContentBlock::Text { text });
                }
                Partial::Tool { name, .. } => {
                    tracing::warn!("dropping unterminated tool call {name}");
                }
            }
        }

        let blocks: Vec<_> = self
            .done
            .into_values()
            .filter(|block| !matches!(block, ContentBlock::Text { text } if text.is_empty()))
            .collect();
        match blocks.as_slice() {
            [ContentBlock::Text { text }] => Message::assistant(text.clone()),
            _ => Message::assistant_blocks(blocks),
        }
    }
}

fn parse_arguments(json: &str) -> Map<String, Value> {
    if json.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str(json) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!("tool arguments are not an object: {other}");
            Map::new()
        }
        Err(e) => {
            tracing::warn!("failed to parse tool arguments: {e}");
            Map::new()
        }
    }
}
