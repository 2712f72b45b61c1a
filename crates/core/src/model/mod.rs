//! Unified LLM interface types and the adapter trait.
//!
//! Provides the shared types used across all providers: `Message`,
//! `Request`, `Response`, `StreamChunk`, `Tool`, and the `Model` trait.

use crate::{Error, Result};
use compact_str::CompactString;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

pub use alternate::{Alternated, PLACEHOLDER_TURN, alternate};
pub use limits::default_context_limit;
pub use message::{Content, ContentBlock, Message, Role, estimate_tokens};
pub use request::{DEFAULT_MAX_TOKENS, Request};
pub use response::{Response, StopReason, Usage};
pub use stream::{
    Assembler, BlockDelta, BlockStart, CHANNEL_CAPACITY, ChunkReceiver, StreamChunk, ToolEvent,
    ToolEventKind, synthesize,
};
pub use tool::{Tool, ToolCall, ToolChoice};

mod alternate;
mod limits;
mod message;
mod request;
mod response;
mod stream;
mod tool;

/// The raw chunk stream produced by an adapter.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// Unified provider adapter trait.
///
/// One implementation per backend family, plus enum dispatch and the
/// registry on top. Adapters hold no per-conversation state: every call is
/// self-contained, so one value may serve many conversations at once.
///
/// Constructors are inherent methods on each adapter and never called
/// polymorphically.
pub trait Model: Sized + Clone + Send + Sync + 'static {
    /// Backend family name (e.g. "anthropic").
    fn name(&self) -> CompactString;

    /// Send a request and wait for the complete response.
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;

    /// Stream a response as normalized chunks.
    ///
    /// Backends without native streaming synthesize the stream from a single
    /// response, see [`synthesize`].
    fn stream(&self, request: Request) -> ChunkStream;

    /// Whether the backend accepts tool definitions.
    fn supports_tool_calling(&self) -> bool {
        true
    }

    /// Model ids this adapter can serve.
    fn available_models(&self) -> Vec<CompactString>;

    /// Model id used when a request leaves `model` empty.
    fn default_model(&self) -> CompactString;

    /// Heuristic token estimate for a piece of text.
    fn estimate_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    /// Context window of the default model, in tokens.
    fn token_limit(&self) -> usize {
        default_context_limit(&self.default_model())
    }

    /// Release adapter resources. Adapters over a shared HTTP client have
    /// nothing to release.
    fn close(&self) {}

    /// [`Model::send`] guarded by a cancellation token.
    ///
    /// Cancelling drops the in-flight future, which releases the underlying
    /// connection.
    fn generate(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Response>> + Send {
        async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                response = self.send(request) => response,
            }
        }
    }

    /// [`Model::stream`] driven by a background task onto a bounded channel.
    fn stream_response(&self, request: Request, cancel: CancellationToken) -> ChunkReceiver {
        ChunkReceiver::spawn(self.stream(request), cancel)
    }
}
