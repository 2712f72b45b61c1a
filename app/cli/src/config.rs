//! Configuration resolution for the CLI.
//!
//! Resolves config.toml in priority order:
//! 1. `--config <path>` flag (explicit override)
//! 2. `{cwd}/.kestrel/config.toml` (workspace config)
//! 3. `~/.config/kestrel/config.toml` (global default)
//!
//! If the global default doesn't exist, it is generated automatically.

use anyhow::{Context, Result};
use model::{BackendConfig, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config template generated when no config exists.
pub const DEFAULT_CONFIG: &str = r#"# Kestrel configuration.
#
# The first provider is the default; pick another with `--provider NAME`.
# `${VAR}` in api_key and base_url expands from the environment.

[[providers]]
name = "local"
provider = "ollama"
model = "llama3.1"

# [[providers]]
# name = "claude"
# provider = "claude"
# model = "claude-sonnet-4-5"
# api_key = "${ANTHROPIC_API_KEY}"

# [[providers]]
# name = "openai"
# provider = "openai"
# model = "gpt-4o"
# api_key = "${OPENAI_API_KEY}"

[session]
memory_file = "KESTREL.md"
max_files = 200

[permissions]
bypass = false
"#;

/// Workspace config path, relative to the working directory.
const WORKSPACE_CONFIG: &str = ".kestrel/config.toml";

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider registry entries; the first is the default.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Session facts settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Permission gate settings.
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

/// What the session tells the model about the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Project memory file, relative to the root.
    #[serde(default = "default_memory_file")]
    pub memory_file: String,
    /// Most project files listed in the system prompt.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memory_file: default_memory_file(),
            max_files: default_max_files(),
        }
    }
}

/// Permission gate settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Approve every tool call without asking.
    #[serde(default)]
    pub bypass: bool,
}

fn default_memory_file() -> String {
    "KESTREL.md".to_owned()
}

fn default_max_files() -> usize {
    200
}

impl Config {
    /// Parse a TOML string, expanding `${VAR}` in provider keys and URLs.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_str)?;
        for provider in &mut config.providers {
            expand_provider(provider);
        }
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

fn expand_provider(provider: &mut ProviderConfig) {
    let expand = |value: &mut String| *value = expand_env_vars(value);
    match &mut provider.backend {
        BackendConfig::Ollama(ollama) => ollama.base_url.iter_mut().for_each(expand),
        BackendConfig::Claude(remote)
        | BackendConfig::OpenAI(remote)
        | BackendConfig::DeepSeek(remote)
        | BackendConfig::Grok(remote)
        | BackendConfig::Qwen(remote)
        | BackendConfig::Kimi(remote)
        | BackendConfig::Gemini(remote) => {
            expand(&mut remote.api_key);
            remote.base_url.iter_mut().for_each(expand);
        }
    }
}

/// Expand `${VAR}` patterns in a string with environment variable values.
///
/// Unknown variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve config following the priority chain, returning where it came from.
pub fn resolve_config(config_flag: Option<&Path>) -> Result<(PathBuf, Config)> {
    if let Some(path) = config_flag {
        let config = Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        return Ok((path.to_owned(), config));
    }

    let workspace_path = PathBuf::from(WORKSPACE_CONFIG);
    if workspace_path.exists() {
        let config = Config::load(&workspace_path)
            .with_context(|| format!("failed to load workspace config from {WORKSPACE_CONFIG}"))?;
        return Ok((workspace_path, config));
    }

    let global_path = global_config_path();
    if !global_path.exists() {
        generate_default_config(&global_path)?;
        tracing::info!("generated default config at {}", global_path.display());
    }
    let config = Config::load(&global_path).context("failed to load global config")?;
    Ok((global_path, config))
}

/// Path to the global default config.
pub fn global_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("kestrel")
        .join("config.toml")
}

/// Write the default config template to `path`.
pub fn generate_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config to {}", path.display()))?;
    Ok(())
}
