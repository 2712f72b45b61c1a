//! Core abstractions for the Kestrel coding assistant.
//!
//! Holds the provider-neutral data model (messages, tools, requests,
//! responses, stream chunks), the [`Model`] adapter trait every backend
//! implements, and the stream normalizer shared by all adapters.

pub use error::{Error, Result};
pub use model::{
    Alternated, Assembler, BlockDelta, BlockStart, ChunkReceiver, ChunkStream, Content,
    ContentBlock, Message, Model, Request, Response, Role, StopReason, StreamChunk, Tool,
    ToolCall, ToolChoice, ToolEvent, ToolEventKind, Usage, alternate, default_context_limit,
    estimate_tokens, synthesize,
};

mod error;
pub mod model;
