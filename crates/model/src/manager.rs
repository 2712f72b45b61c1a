//! `ProviderManager`: concurrent-safe named provider map with active-provider
//! swapping.

use crate::{Provider, ProviderConfig, build_provider};
use compact_str::CompactString;
use kcore::{ChunkStream, Error, Model, Request, Response, Result};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

/// Manages a set of named providers with an active selection.
///
/// All methods that read or mutate the inner state acquire the `RwLock`.
/// `active()` returns a clone of the current `Provider`, so callers never
/// hold the lock while performing LLM calls.
pub struct ProviderManager {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    /// Provider instances keyed by entry name.
    providers: BTreeMap<CompactString, (ProviderConfig, Provider)>,
    /// Name of the currently active provider.
    active: CompactString,
    /// Shared HTTP client for constructing new providers.
    client: reqwest::Client,
}

/// Info about a single provider entry returned by `list()`.
#[derive(Debug, Clone)]
pub struct ProviderEntry {
    /// Entry name (key).
    pub name: CompactString,
    /// Backend kind, e.g. "claude".
    pub kind: &'static str,
    /// Models the entry serves, default first.
    pub models: Vec<CompactString>,
    /// Context window of the default model.
    pub token_limit: usize,
    /// Whether this is the active provider.
    pub active: bool,
}

impl ProviderManager {
    /// Create a new manager from a list of provider configs.
    ///
    /// The first element becomes the active provider. Returns an error if
    /// the slice is empty, any config fails validation, or any provider
    /// fails to build.
    pub fn from_configs(configs: &[ProviderConfig]) -> Result<Self> {
        let Some(first) = configs.first() else {
            return Err(Error::Config(
                "at least one provider config is required".into(),
            ));
        };

        let client = reqwest::Client::new();
        let mut providers = BTreeMap::new();
        for config in configs {
            config.validate()?;
            let provider = build_provider(config, client.clone())?;
            if providers
                .insert(config.name.clone(), (config.clone(), provider))
                .is_some()
            {
                return Err(Error::Config(format!(
                    "duplicate provider name '{}'",
                    config.name
                )));
            }
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                providers,
                active: first.name.clone(),
                client,
            })),
        })
    }

    /// Create a manager with a single provider.
    pub fn single(config: ProviderConfig, provider: Provider) -> Self {
        let name = config.name.clone();
        let mut providers = BTreeMap::new();
        providers.insert(name.clone(), (config, provider));
        Self {
            inner: Arc::new(RwLock::new(Inner {
                providers,
                active: name,
                client: reqwest::Client::new(),
            })),
        }
    }

    /// Get a clone of the provider named `name`.
    pub fn get(&self, name: &str) -> Option<Provider> {
        self.inner
            .read()
            .providers
            .get(name)
            .map(|(_, provider)| provider.clone())
    }

    /// Get a clone of the active provider.
    pub fn active(&self) -> Provider {
        let inner = self.inner.read();
        inner.providers[&inner.active].1.clone()
    }

    /// Get the name of the active provider.
    pub fn active_name(&self) -> CompactString {
        self.inner.read().active.clone()
    }

    /// Get a clone of the active provider's config.
    pub fn active_config(&self) -> ProviderConfig {
        let inner = self.inner.read();
        inner.providers[&inner.active].0.clone()
    }

    /// Switch to a different provider by name. Returns an error if the name
    /// is not found.
    pub fn switch(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.providers.contains_key(name) {
            return Err(Error::Config(format!("provider '{name}' not found")));
        }
        tracing::debug!("switching active provider to '{name}'");
        inner.active = CompactString::from(name);
        Ok(())
    }

    /// Add a new provider. Validates config first. Replaces any existing
    /// provider with the same name.
    pub fn add(&self, config: &ProviderConfig) -> Result<()> {
        config.validate()?;
        let client = self.inner.read().client.clone();
        let provider = build_provider(config, client)?;
        self.inner
            .write()
            .providers
            .insert(config.name.clone(), (config.clone(), provider));
        Ok(())
    }

    /// Remove a provider by name. Fails if the provider is currently active.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.active == name {
            return Err(Error::Config(format!(
                "cannot remove the active provider '{name}'"
            )));
        }
        if inner.providers.remove(name).is_none() {
            return Err(Error::Config(format!("provider '{name}' not found")));
        }
        Ok(())
    }

    /// List all providers with their active status.
    pub fn list(&self) -> Vec<ProviderEntry> {
        let inner = self.inner.read();
        inner
            .providers
            .iter()
            .map(|(name, (config, provider))| ProviderEntry {
                name: name.clone(),
                kind: config.kind(),
                models: provider.available_models(),
                token_limit: provider.token_limit(),
                active: *name == inner.active,
            })
            .collect()
    }
}

impl Model for ProviderManager {
    fn name(&self) -> CompactString {
        self.active().name()
    }

    async fn send(&self, request: &Request) -> Result<Response> {
        let provider = self.active();
        provider.send(request).await
    }

    fn stream(&self, request: Request) -> ChunkStream {
        self.active().stream(request)
    }

    fn supports_tool_calling(&self) -> bool {
        self.active().supports_tool_calling()
    }

    fn available_models(&self) -> Vec<CompactString> {
        self.active().available_models()
    }

    fn default_model(&self) -> CompactString {
        self.active().default_model()
    }

    fn token_limit(&self) -> usize {
        self.active().token_limit()
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ProviderManager")
            .field("active", &inner.active)
            .field("count", &inner.providers.len())
            .finish()
    }
}

impl Clone for ProviderManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
