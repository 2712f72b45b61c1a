//! LLM provider adapters for Kestrel.
//!
//! One adapter per backend family, each translating the generic request
//! into its wire format and its replies into the normalized chunk
//! vocabulary. `Provider` dispatches over them and `ProviderManager` holds
//! the named registry.

pub use catalog::Catalog;
pub use claude::Claude;
pub use config::{BackendConfig, OllamaConfig, ProviderConfig, RemoteConfig};
pub use gemini::Gemini;
pub use http::HttpProvider;
pub use manager::{ProviderEntry, ProviderManager};
pub use ollama::Ollama;
pub use openai::OpenAI;
pub use provider::{Provider, build_provider};
pub use reqwest::Client;

mod catalog;
pub mod claude;
mod config;
pub mod gemini;
pub mod http;
mod manager;
pub mod ollama;
pub mod openai;
mod provider;
pub mod sse;

/// A fresh call id for backends that do not assign one.
fn tool_id() -> compact_str::CompactString {
    compact_str::format_compact!("call_{}", ulid::Ulid::new())
}
