//! Ollama LLM provider.
//!
//! Talks to the native `/api/chat` endpoint, which streams newline-delimited
//! JSON rather than server-sent events.

use crate::{Catalog, HttpProvider, sse};
use async_stream::try_stream;
use compact_str::CompactString;
use futures_util::StreamExt;
use kcore::{ChunkStream, Error, Model, Response, Result};
use reqwest::Client;
use std::time::Instant;
pub use request::{Options, Request, wire_messages};
pub use stream::{Decoder, Line};

mod request;
mod stream;

/// Local Ollama chat endpoint.
pub const ENDPOINT: &str = "http://localhost:11434/api/chat";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// The Ollama LLM provider.
#[derive(Clone)]
pub struct Ollama {
    http: HttpProvider,
    catalog: Catalog,
}

impl Ollama {
    /// Create a provider targeting the local Ollama instance.
    pub fn local(client: Client) -> Self {
        Self::custom(client, ENDPOINT)
    }

    /// Create a provider targeting a custom Ollama endpoint.
    pub fn custom(client: Client, endpoint: &str) -> Self {
        Self {
            http: HttpProvider::no_auth(client, endpoint),
            catalog: Catalog::new(DEFAULT_MODEL),
        }
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

impl Model for Ollama {
    fn name(&self) -> CompactString {
        CompactString::const_new("ollama")
    }

    async fn send(&self, request: &kcore::Request) -> Result<Response> {
        let body = Request::new(request, &self.catalog);
        let started = Instant::now();
        let line: Line = self.http.send(&body, "ollama response").await?;
        if let Some(message) = line.error {
            return Err(Error::Backend(message));
        }
        Ok(line.into_response(started.elapsed()))
    }

    fn stream(&self, request: kcore::Request) -> ChunkStream {
        let body = Request::new(&request, &self.catalog).stream();
        let http = self.http.clone();
        try_stream! {
            let response = http.post_stream(&body).await?;
            let mut lines = std::pin::pin!(sse::lines(response));
            let mut decoder = Decoder::default();
            while let Some(line) = lines.next().await {
                let line = line?;
                match serde_json::from_str::<Line>(&line) {
                    Ok(line) => {
                        let done = line.done;
                        for chunk in decoder.accept(line) {
                            yield chunk;
                        }
                        if done {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("failed to parse ollama line: {e}, data: {line}"),
                }
            }
            for chunk in decoder.finish() {
                yield chunk;
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
