//! OpenAI-compatible LLM provider.
//!
//! Covers OpenAI, DeepSeek, Grok (xAI), Qwen (Alibaba), Kimi (Moonshot),
//! and any other service exposing the OpenAI chat completions API.

use crate::{Catalog, HttpProvider, sse};
use async_stream::try_stream;
use compact_str::CompactString;
use futures_util::StreamExt;
use kcore::{ChunkStream, Model, Response, Result};
use reqwest::Client;
use std::time::Instant;
pub use request::{Request, wire_messages};
pub use stream::{Chunk, Raw, Translator};

mod request;
mod stream;

/// OpenAI-compatible endpoint URLs.
pub mod endpoint {
    /// OpenAI chat completions.
    pub const OPENAI: &str = "https://api.openai.com/v1/chat/completions";
    /// DeepSeek chat completions.
    pub const DEEPSEEK: &str = "https://api.deepseek.com/chat/completions";
    /// Grok (xAI) chat completions.
    pub const GROK: &str = "https://api.x.ai/v1/chat/completions";
    /// Qwen (Alibaba DashScope) chat completions.
    pub const QWEN: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
    /// Kimi (Moonshot) chat completions.
    pub const KIMI: &str = "https://api.moonshot.cn/v1/chat/completions";
}

/// An OpenAI-compatible LLM provider.
#[derive(Clone)]
pub struct OpenAI {
    name: CompactString,
    http: HttpProvider,
    catalog: Catalog,
}

impl OpenAI {
    /// Create a provider targeting the OpenAI API.
    pub fn api(client: Client, key: &str) -> Result<Self> {
        Ok(Self::custom(client, key, endpoint::OPENAI)?
            .with_catalog(Catalog::new("gpt-4o").with_models(["gpt-4o-mini", "gpt-4.1", "o3-mini"])))
    }

    /// Create a provider targeting the DeepSeek API.
    pub fn deepseek(client: Client, key: &str) -> Result<Self> {
        Ok(Self::custom(client, key, endpoint::DEEPSEEK)?
            .named("deepseek")
            .with_catalog(Catalog::new("deepseek-chat").with_models(["deepseek-reasoner"])))
    }

    /// Create a provider targeting the Grok (xAI) API.
    pub fn grok(client: Client, key: &str) -> Result<Self> {
        Ok(Self::custom(client, key, endpoint::GROK)?
            .named("grok")
            .with_catalog(Catalog::new("grok-3").with_models(["grok-3-mini"])))
    }

    /// Create a provider targeting the Qwen (DashScope) API.
    pub fn qwen(client: Client, key: &str) -> Result<Self> {
        Ok(Self::custom(client, key, endpoint::QWEN)?
            .named("qwen")
            .with_catalog(Catalog::new("qwen-plus").with_models(["qwen-max", "qwen-turbo"])))
    }

    /// Create a provider targeting the Kimi (Moonshot) API.
    pub fn kimi(client: Client, key: &str) -> Result<Self> {
        Ok(Self::custom(client, key, endpoint::KIMI)?
            .named("kimi")
            .with_catalog(Catalog::new("kimi-k2-0711-preview").with_models(["moonshot-v1-128k"])))
    }

    /// Create a provider targeting a custom OpenAI-compatible endpoint.
    pub fn custom(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        Ok(Self {
            name: CompactString::const_new("openai"),
            http: HttpProvider::bearer(client, key, endpoint)?,
            catalog: Catalog::new("gpt-4o"),
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

    /// Point the provider at a different chat completions endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.http = self.http.with_endpoint(endpoint);
        self
    }

    fn named(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }
}

impl Model for OpenAI {
    fn name(&self) -> CompactString {
        self.name.clone()
    }

    async fn send(&self, request: &kcore::Request) -> Result<Response> {
        let body = Request::new(request, &self.catalog);
        let started = Instant::now();
        let raw: Raw = self.http.send(&body, "chat completion").await?;
        Ok(raw.into_response(started.elapsed()))
    }

    fn stream(&self, request: kcore::Request) -> ChunkStream {
        let body = Request::new(&request, &self.catalog).stream();
        let http = self.http.clone();
        try_stream! {
            let response = http.post_stream(&body).await?;
            let mut events = std::pin::pin!(sse::events(response));
            let mut translator = Translator::default();
            while let Some(event) = events.next().await {
                let event = event?;
                let data = event.data.trim();
                if data == "[DONE]" {
                    break;
                }
                match serde_json::from_str::<Chunk>(data) {
                    Ok(chunk) => {
                        for chunk in translator.accept(chunk) {
                            yield chunk;
                        }
                    }
                    Err(e) => tracing::warn!("failed to parse chunk: {e}, data: {data}"),
                }
            }
            for chunk in translator.finish() {
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
