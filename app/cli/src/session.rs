//! Session assembly: config, provider registry, tools, and facts.

use crate::{
    config::{Config, resolve_config},
    facts, tools,
};
use anyhow::{Context, Result};
use kcore::Model;
use model::ProviderManager;
use runtime::{Conversation, Event, Outcome};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Options shared by every session-running command.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Explicit config path.
    pub config: Option<PathBuf>,
    /// Provider entry to activate instead of the first.
    pub provider: Option<String>,
    /// Project root; the working directory when unset.
    pub root: Option<PathBuf>,
    /// Approve every tool call.
    pub yes: bool,
}

/// Load config and build the provider registry, honouring `--provider`.
pub fn providers(options: &Options) -> Result<(Config, ProviderManager)> {
    let (path, config) = resolve_config(options.config.as_deref())?;
    tracing::debug!("using config {}", path.display());
    if config.providers.is_empty() {
        anyhow::bail!("no providers configured in {}", path.display());
    }

    let manager = ProviderManager::from_configs(&config.providers)
        .with_context(|| format!("invalid provider config in {}", path.display()))?;
    if let Some(name) = &options.provider {
        manager.switch(name)?;
    }
    Ok((config, manager))
}

/// Build a conversation and the receiver of its UI events.
pub fn conversation(
    options: &Options,
) -> Result<(Conversation<ProviderManager>, mpsc::UnboundedReceiver<Event>)> {
    let (config, manager) = providers(options)?;
    let root = project_root(options.root.as_deref())?;
    let facts = facts::collect(
        &root,
        manager.active_name(),
        manager.default_model(),
        &config.session,
    );
    tracing::debug!(
        "session: provider {} model {}, {} files",
        facts.provider,
        facts.model,
        facts.files.len()
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let conversation = Conversation::new(manager, tools::toolbox(&root), facts, tx);
    conversation
        .gate()
        .set_bypass(options.yes || config.permissions.bypass);
    Ok((conversation, rx))
}

/// Canonical project root: `root` or the working directory.
pub fn project_root(root: Option<&Path>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root.to_owned(),
        None => std::env::current_dir().context("failed to read the working directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("project root {} is not accessible", root.display()))
}

/// Run one turn; Ctrl-C cancels it.
pub async fn turn<M: Model>(conversation: &mut Conversation<M>, text: &str) -> Outcome {
    let cancel = CancellationToken::new();
    let mut turn = std::pin::pin!(conversation.turn(text, &cancel));
    tokio::select! {
        outcome = &mut turn => return outcome,
        _ = tokio::signal::ctrl_c() => {}
    }
    tracing::debug!("interrupted, cancelling turn");
    cancel.cancel();
    turn.await
}
