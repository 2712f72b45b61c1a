//! Unified `Provider` enum with enum dispatch over concrete backends.
//!
//! `build_provider()` matches on the config's backend. Adding a backend means
//! a new variant here and nothing upstream.

use crate::{
    claude::Claude,
    config::{BackendConfig, ProviderConfig},
    gemini::Gemini,
    ollama::Ollama,
    openai::{OpenAI, endpoint},
};
use compact_str::CompactString;
use kcore::{ChunkStream, Model, Request, Response, Result};
use reqwest::Client;

/// Unified LLM provider enum.
///
/// The registry constructs the appropriate variant from config. The
/// orchestrator is monomorphized on `ProviderManager`, which holds these.
#[derive(Clone)]
pub enum Provider {
    /// Anthropic Messages API.
    Claude(Claude),
    /// OpenAI-compatible API (covers OpenAI, DeepSeek, Grok, Qwen, Kimi).
    OpenAI(OpenAI),
    /// Ollama native chat API.
    Ollama(Ollama),
    /// Gemini generateContent API.
    Gemini(Gemini),
}

/// Construct a `Provider` from config and a shared HTTP client.
pub fn build_provider(config: &ProviderConfig, client: Client) -> Result<Provider> {
    let base_url = config.base_url();
    let provider = match &config.backend {
        BackendConfig::Claude(remote) => {
            let claude = match base_url {
                Some(url) => Claude::custom(client, &remote.api_key, url)?,
                None => Claude::anthropic(client, &remote.api_key)?,
            };
            let catalog = config.catalog(claude.catalog().clone());
            Provider::Claude(claude.with_catalog(catalog))
        }
        BackendConfig::OpenAI(remote)
        | BackendConfig::DeepSeek(remote)
        | BackendConfig::Grok(remote)
        | BackendConfig::Qwen(remote)
        | BackendConfig::Kimi(remote) => {
            let key = remote.api_key.as_str();
            let openai = match (&config.backend, base_url) {
                (BackendConfig::DeepSeek(_), url) => {
                    OpenAI::deepseek(client, key)?.with_endpoint(url.unwrap_or(endpoint::DEEPSEEK))
                }
                (BackendConfig::Grok(_), url) => {
                    OpenAI::grok(client, key)?.with_endpoint(url.unwrap_or(endpoint::GROK))
                }
                (BackendConfig::Qwen(_), url) => {
                    OpenAI::qwen(client, key)?.with_endpoint(url.unwrap_or(endpoint::QWEN))
                }
                (BackendConfig::Kimi(_), url) => {
                    OpenAI::kimi(client, key)?.with_endpoint(url.unwrap_or(endpoint::KIMI))
                }
                (_, url) => {
                    OpenAI::api(client, key)?.with_endpoint(url.unwrap_or(endpoint::OPENAI))
                }
            };
            let catalog = config.catalog(openai.catalog().clone());
            Provider::OpenAI(openai.with_catalog(catalog))
        }
        BackendConfig::Ollama(_) => {
            let ollama = match base_url {
                Some(url) => Ollama::custom(client, url),
                None => Ollama::local(client),
            };
            let catalog = config.catalog(ollama.catalog().clone());
            Provider::Ollama(ollama.with_catalog(catalog))
        }
        BackendConfig::Gemini(remote) => {
            let gemini = match base_url {
                Some(url) => Gemini::custom(client, &remote.api_key, url)?,
                None => Gemini::api(client, &remote.api_key)?,
            };
            let catalog = config.catalog(gemini.catalog().clone());
            Provider::Gemini(gemini.with_catalog(catalog))
        }
    };
    tracing::debug!(
        "built {} provider '{}' with model {}",
        config.kind(),
        config.name,
        provider.default_model()
    );
    Ok(provider)
}

impl Model for Provider {
    fn name(&self) -> CompactString {
        match self {
            Self::Claude(p) => p.name(),
            Self::OpenAI(p) => p.name(),
            Self::Ollama(p) => p.name(),
            Self::Gemini(p) => p.name(),
        }
    }

    async fn send(&self, request: &Request) -> Result<Response> {
        match self {
            Self::Claude(p) => p.send(request).await,
            Self::OpenAI(p) => p.send(request).await,
            Self::Ollama(p) => p.send(request).await,
            Self::Gemini(p) => p.send(request).await,
        }
    }

    fn stream(&self, request: Request) -> ChunkStream {
        match self {
            Self::Claude(p) => p.stream(request),
            Self::OpenAI(p) => p.stream(request),
            Self::Ollama(p) => p.stream(request),
            Self::Gemini(p) => p.stream(request),
        }
    }

    fn supports_tool_calling(&self) -> bool {
        match self {
            Self::Claude(p) => p.supports_tool_calling(),
            Self::OpenAI(p) => p.supports_tool_calling(),
            Self::Ollama(p) => p.supports_tool_calling(),
            Self::Gemini(p) => p.supports_tool_calling(),
        }
    }

    fn available_models(&self) -> Vec<CompactString> {
        match self {
            Self::Claude(p) => p.available_models(),
            Self::OpenAI(p) => p.available_models(),
            Self::Ollama(p) => p.available_models(),
            Self::Gemini(p) => p.available_models(),
        }
    }

    fn default_model(&self) -> CompactString {
        match self {
            Self::Claude(p) => p.default_model(),
            Self::OpenAI(p) => p.default_model(),
            Self::Ollama(p) => p.default_model(),
            Self::Gemini(p) => p.default_model(),
        }
    }

    fn token_limit(&self) -> usize {
        match self {
            Self::Claude(p) => p.token_limit(),
            Self::OpenAI(p) => p.token_limit(),
            Self::Ollama(p) => p.token_limit(),
            Self::Gemini(p) => p.token_limit(),
        }
    }
}
