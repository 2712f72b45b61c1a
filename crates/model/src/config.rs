//! Provider configuration
//!
//! Uses `#[serde(tag = "provider", flatten)]` so backend fields appear at the
//! same level as the entry's identity in TOML.

use crate::Catalog;
use compact_str::CompactString;
use kcore::{Error, Result};
use serde::{Deserialize, Serialize};

/// Named provider configuration. Combines identity (`name`) and model
/// selection with the backend settings via `BackendConfig`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Unique name for this provider entry. Defaults to `"default"`.
    #[serde(default = "default_name")]
    pub name: CompactString,
    /// Default model. Empty means the adapter's built-in default.
    #[serde(default)]
    pub model: CompactString,
    /// Additional models this entry may serve.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<CompactString>,
    /// Context window override, in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_limit: Option<usize>,
    /// Output cap used when a request sets none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Backend-specific settings, discriminated by the `provider` field.
    #[serde(flatten)]
    pub backend: BackendConfig,
}

impl ProviderConfig {
    /// Human-readable provider kind string for logging and listings.
    pub fn kind(&self) -> &'static str {
        match &self.backend {
            BackendConfig::Claude(_) => "claude",
            BackendConfig::OpenAI(_) => "openai",
            BackendConfig::DeepSeek(_) => "deepseek",
            BackendConfig::Grok(_) => "grok",
            BackendConfig::Qwen(_) => "qwen",
            BackendConfig::Kimi(_) => "kimi",
            BackendConfig::Ollama(_) => "ollama",
            BackendConfig::Gemini(_) => "gemini",
        }
    }

    /// Check the entry can build an adapter.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("provider name must not be empty".into()));
        }
        if let Some(remote) = self.backend.remote()
            && remote.api_key.trim().is_empty()
        {
            return Err(Error::Config(format!(
                "provider '{}' ({}) requires an api_key",
                self.name,
                self.kind()
            )));
        }
        if self.context_limit == Some(0) {
            return Err(Error::Config(format!(
                "provider '{}' has a zero context_limit",
                self.name
            )));
        }
        Ok(())
    }

    /// Base URL override, if any.
    pub fn base_url(&self) -> Option<&str> {
        match &self.backend {
            BackendConfig::Ollama(config) => config.base_url.as_deref(),
            backend => backend.remote().and_then(|r| r.base_url.as_deref()),
        }
    }

    /// Apply the entry's model and limit overrides to an adapter catalog.
    pub fn catalog(&self, defaults: Catalog) -> Catalog {
        let mut catalog = defaults;
        if !self.model.is_empty() {
            catalog.default_model = self.model.clone();
        }
        if !self.models.is_empty() {
            catalog.models = self.models.clone();
        }
        catalog
            .with_context_limit(self.context_limit)
            .with_max_tokens(self.max_tokens)
    }
}

/// Backend-specific configuration, discriminated by the `provider` field
/// in TOML/JSON.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Claude (Anthropic) Messages API.
    Claude(RemoteConfig),
    /// OpenAI API.
    #[serde(rename = "openai")]
    OpenAI(RemoteConfig),
    /// DeepSeek API, OpenAI-compatible.
    #[serde(rename = "deepseek")]
    DeepSeek(RemoteConfig),
    /// Grok (xAI) API, OpenAI-compatible.
    Grok(RemoteConfig),
    /// Qwen (Alibaba DashScope) API, OpenAI-compatible.
    Qwen(RemoteConfig),
    /// Kimi (Moonshot) API, OpenAI-compatible.
    Kimi(RemoteConfig),
    /// Ollama native chat API, no key required.
    Ollama(OllamaConfig),
    /// Gemini (Google) generateContent API.
    Gemini(RemoteConfig),
}

impl BackendConfig {
    /// The remote settings, for keyed backends.
    pub fn remote(&self) -> Option<&RemoteConfig> {
        match self {
            Self::Claude(c)
            | Self::OpenAI(c)
            | Self::DeepSeek(c)
            | Self::Grok(c)
            | Self::Qwen(c)
            | Self::Kimi(c)
            | Self::Gemini(c) => Some(c),
            Self::Ollama(_) => None,
        }
    }
}

/// Configuration for remote HTTP API providers.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RemoteConfig {
    /// API key (supports `${ENV_VAR}` expansion at the config layer).
    #[serde(default)]
    pub api_key: String,
    /// Optional base URL override for the provider endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Configuration for Ollama (no key required).
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OllamaConfig {
    /// Optional base URL override. Defaults to `http://localhost:11434/api/chat`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_name() -> CompactString {
    CompactString::const_new("default")
}
