//! Claude (Anthropic) LLM provider.
//!
//! Implements the Anthropic Messages API, which requires strict role
//! alternation and streams typed SSE events.

use crate::{Catalog, HttpProvider, sse};
use async_stream::try_stream;
use compact_str::CompactString;
use futures_util::StreamExt;
use kcore::{ChunkStream, Model, Response, Result};
use reqwest::Client;
use std::time::Instant;
pub use request::Request;
pub use stream::{Event, Raw};

mod request;
mod stream;

/// The Anthropic Messages API endpoint.
pub const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// The Anthropic API version header value.
const API_VERSION: &str = "2023-06-01";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// The Claude LLM provider.
#[derive(Clone)]
pub struct Claude {
    http: HttpProvider,
    catalog: Catalog,
}

impl Claude {
    /// Create a provider targeting the Anthropic API.
    pub fn anthropic(client: Client, key: &str) -> Result<Self> {
        Self::custom(client, key, ENDPOINT)
    }

    /// Create a provider targeting a custom Anthropic-compatible endpoint.
    pub fn custom(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        let http = HttpProvider::custom_header(client, "x-api-key", key, endpoint)?
            .with_header("anthropic-version", API_VERSION)?;
        Ok(Self {
            http,
            catalog: Catalog::new(DEFAULT_MODEL).with_models([
                "claude-opus-4-1",
                "claude-sonnet-4-5",
                "claude-3-5-haiku-latest",
            ]),
        })
    }

    /// Replace the model catalog.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// The model catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl Model for Claude {
    fn name(&self) -> CompactString {
        CompactString::const_new("anthropic")
    }

    async fn send(&self, request: &kcore::Request) -> Result<Response> {
        let body = Request::new(request, &self.catalog);
        let started = Instant::now();
        let raw: Raw = self.http.send(&body, "anthropic response").await?;
        Ok(raw.into_response(started.elapsed()))
    }

    fn stream(&self, request: kcore::Request) -> ChunkStream {
        let body = Request::new(&request, &self.catalog).stream();
        let http = self.http.clone();
        try_stream! {
            let response = http.post_stream(&body).await?;
            let mut events = std::pin::pin!(sse::events(response));
            while let Some(event) = events.next().await {
                let event = event?;
                match serde_json::from_str::<Event>(&event.data) {
                    Ok(event) => {
                        for chunk in event.into_chunks() {
                            yield chunk;
                        }
                    }
                    Err(e) => tracing::warn!("failed to parse anthropic event: {e}, data: {}", event.data),
                }
            }
        }
        .boxed()
    }

    fn available_models(&self) -> Vec<CompactString> {
        self.catalog.available()
    }

    fn default_model(&self) -> CompactString {
        self.catalog.default_model.clone()
    }

    fn token_limit(&self) -> usize {
        self.catalog.token_limit()
    }
}
