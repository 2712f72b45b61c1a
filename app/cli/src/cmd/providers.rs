//! Provider listing command.

use crate::session;
use anyhow::Result;
use model::ProviderEntry;

/// Print the configured providers, marking the active one.
pub fn run(options: &session::Options) -> Result<()> {
    let (_, manager) = session::providers(options)?;
    for entry in manager.list() {
        println!("{}", format_entry(&entry));
    }
    Ok(())
}

/// One listing line: marker, name, kind, context window, models.
pub fn format_entry(entry: &ProviderEntry) -> String {
    let marker = if entry.active { '*' } else { ' ' };
    let models = entry
        .models
        .iter()
        .map(|model| model.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{marker} {:<12} {:<9} {:>9} tokens  {models}",
        entry.name, entry.kind, entry.token_limit
    )
}
