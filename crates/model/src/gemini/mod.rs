//! Gemini (Google) LLM provider.
//!
//! Uses the single-shot `generateContent` endpoint; streams are synthesized
//! from the complete response.

use crate::{Catalog, HttpProvider};
use async_stream::try_stream;
use compact_str::CompactString;
use futures_util::StreamExt;
use kcore::{ChunkStream, Model, Response, Result, synthesize};
use reqwest::Client;
use std::time::Instant;
pub use request::Request;
pub use response::Raw;

mod request;
mod response;

/// The Gemini API base URL.
pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// The Gemini LLM provider.
#[derive(Clone)]
pub struct Gemini {
    http: HttpProvider,
    base_url: String,
    catalog: Catalog,
}

impl Gemini {
    /// Create a provider targeting the Gemini API.
    pub fn api(client: Client, key: &str) -> Result<Self> {
        Self::custom(client, key, BASE_URL)
    }

    /// Create a provider targeting a custom Gemini-compatible base URL.
    pub fn custom(client: Client, key: &str, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        Ok(Self {
            http: HttpProvider::custom_header(client, "x-goog-api-key", key, &base_url)?,
            base_url,
            catalog: Catalog::new(DEFAULT_MODEL).with_models(["gemini-2.5-pro", "gemini-1.5-pro"]),
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

    /// `generateContent` URL for `model`.
    pub fn url(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

impl Model for Gemini {
    fn name(&self) -> CompactString {
        CompactString::const_new("gemini")
    }

    async fn send(&self, request: &kcore::Request) -> Result<Response> {
        let url = self.url(self.catalog.model(request));
        let body = Request::new(request, &self.catalog);
        let started = Instant::now();
        let raw: Raw = self.http.send_to(&url, &body, "gemini response").await?;
        Ok(raw.into_response(started.elapsed()))
    }

    fn stream(&self, request: kcore::Request) -> ChunkStream {
        let this = self.clone();
        try_stream! {
            let response = this.send(&request).await?;
            for chunk in synthesize(&response) {
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
