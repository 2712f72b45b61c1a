//! Context building: fits unbounded history into a per-model token budget.
//!
//! The system message is charged first and never pruned, then the new user
//! text. History is selected newest first until the first message that does
//! not fit, so the kept part is always a contiguous suffix. The excluded
//! prefix collapses into a one-line summary when the summary still fits.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use kcore::{ContentBlock, Message, Role, estimate_tokens};
use std::{collections::HashMap, fmt::Write, path::PathBuf};

/// Default system preamble.
pub const PREAMBLE: &str = include_str!("../prompts/system.md");

/// Share of the context window requests may fill, as a fraction of 5.
const BUDGET_FIFTHS: usize = 4;

/// Longest snippet quoted in a summary, in characters.
const SNIPPET_CHARS: usize = 80;

/// Messages longer than this count as substantial.
const LONG_MESSAGE_CHARS: usize = 200;

const WEIGHT_POSITION: f64 = 0.4;
const WEIGHT_TOOL_USE: f64 = 0.3;
const WEIGHT_ERROR: f64 = 0.2;
const WEIGHT_TOOL_RESULT: f64 = 0.3;
const WEIGHT_LENGTH: f64 = 0.1;

/// Tools that read or write files, counted in summaries.
const FILE_TOOLS: &[&str] = &[
    "read_file",
    "write_file",
    "edit_file",
    "create_file",
    "delete_file",
    "list_files",
];

const ERROR_WORDS: &[&str] = &["error", "failed", "failure", "panic", "exception"];

/// Live project facts rendered into the system message.
#[derive(Debug, Clone, Default)]
pub struct SessionFacts {
    /// Active provider name.
    pub provider: CompactString,
    /// Active model id.
    pub model: CompactString,
    /// Project root.
    pub root: PathBuf,
    /// Project files, relative to the root.
    pub files: Vec<String>,
    /// Contents of the project memory file, if any.
    pub memory: Option<String>,
}

impl SessionFacts {
    /// Render the facts as a system-prompt section.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Session");
        let _ = writeln!(out, "Provider: {}", self.provider);
        let _ = writeln!(out, "Model: {}", self.model);
        let _ = writeln!(out, "Root: {}", self.root.display());

        if !self.files.is_empty() {
            let _ = writeln!(out, "\n# Project files");
            for file in &self.files {
                let _ = writeln!(out, "- {file}");
            }
        }

        if let Some(memory) = self.memory.as_deref().filter(|m| !m.trim().is_empty()) {
            let _ = writeln!(out, "\n# Project memory");
            out.push_str(memory.trim_end());
            out.push('\n');
        }
        out
    }
}

/// Contiguous suffix of history chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Index of the first kept message.
    pub start: usize,
    /// Estimated tokens of the kept messages.
    pub tokens: usize,
}

/// Select the longest suffix of `history` whose estimate fits `budget`.
///
/// Walks newest to oldest and stops at the first message that would
/// overflow, even if older, smaller messages would still fit.
pub fn select(history: &[Message], budget: usize) -> Selection {
    let mut tokens = 0;
    let mut start = history.len();
    for (index, message) in history.iter().enumerate().rev() {
        let cost = message.estimate_tokens();
        if tokens + cost > budget {
            break;
        }
        tokens += cost;
        start = index;
    }
    Selection { start, tokens }
}

/// A history message with metadata derived at prune time.
#[derive(Debug, Clone)]
pub struct ConversationEntry<'a> {
    /// The message.
    pub message: &'a Message,
    /// When the entry was derived.
    pub timestamp: DateTime<Utc>,
    /// Estimated token cost.
    pub tokens: usize,
    /// Relative importance, for ranking only.
    pub importance: f64,
    /// Whether the message carries a tool call or result.
    pub has_tool: bool,
}

impl<'a> ConversationEntry<'a> {
    /// Derive the entry for the message at `position` of `total`.
    pub fn new(message: &'a Message, position: usize, total: usize) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
            tokens: message.estimate_tokens(),
            importance: importance(message, position, total),
            has_tool: message.has_tool_use() || message.has_tool_result(),
        }
    }
}

/// Importance of the message at `position` of `total`.
///
/// An unclamped weighted sum: later messages, tool traffic, errors and long
/// messages rank higher.
pub fn importance(message: &Message, position: usize, total: usize) -> f64 {
    let text = message.text();
    let mut score = 0.0;
    if total > 0 {
        score += WEIGHT_POSITION * position as f64 / total as f64;
    }
    if message.role == Role::Assistant && message.has_tool_use() {
        score += WEIGHT_TOOL_USE;
    }
    if mentions_error(&text) {
        score += WEIGHT_ERROR;
    }
    if message.has_tool_result() {
        score += WEIGHT_TOOL_RESULT;
    }
    if text.chars().count() > LONG_MESSAGE_CHARS {
        score += WEIGHT_LENGTH;
    }
    score
}

fn mentions_error(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_WORDS.iter().any(|word| lower.contains(word))
}

fn is_file_mention(word: &str) -> bool {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '_');
    let Some((stem, ext)) = word.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
        && ext.chars().any(|c| c.is_ascii_alphabetic())
}

/// One-line summary of an excluded history prefix.
pub fn summarize(excluded: &[Message]) -> String {
    let total = excluded.len();
    let entries: Vec<_> = excluded
        .iter()
        .enumerate()
        .map(|(position, message)| ConversationEntry::new(message, position, total))
        .collect();

    let mut calls = HashMap::new();
    let mut file_ops = 0;
    let mut file_mentions = 0;
    let mut errors = 0;
    let mut tool_results = 0;
    for entry in &entries {
        let text = entry.message.text();
        file_mentions += text.split_whitespace().filter(|w| is_file_mention(w)).count();
        if mentions_error(&text) {
            errors += 1;
        }
        for block in entry.message.blocks() {
            match block {
                ContentBlock::ToolUse { id, name, .. } => {
                    calls.insert(id, name);
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    is_error,
                    ..
                } => {
                    tool_results += 1;
                    let file_tool = calls
                        .get(&tool_use_id)
                        .is_some_and(|name| FILE_TOOLS.contains(&name.as_str()));
                    if file_tool && !is_error {
                        file_ops += 1;
                    }
                }
                _ => {}
            }
        }
    }

    let counts: Vec<String> = [
        (file_ops, "file operation"),
        (file_mentions, "file mention"),
        (errors, "error"),
        (tool_results, "tool result"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| {
        let plural = if count == 1 { "" } else { "s" };
        format!("{count} {label}{plural}")
    })
    .collect();

    if counts.is_empty() {
        return format!("[Earlier conversation: {total} prior messages omitted]");
    }

    let mut summary = format!(
        "[Earlier conversation: {total} messages, {}",
        counts.join(", ")
    );
    let key = entries
        .iter()
        .filter(|entry| !entry.message.text().trim().is_empty())
        .max_by(|a, b| a.importance.total_cmp(&b.importance));
    if let Some(entry) = key {
        let text = entry.message.text();
        let snippet: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let snippet: String = snippet.chars().take(SNIPPET_CHARS).collect();
        let _ = write!(summary, "; latest key point: {snippet}");
    }
    summary.push(']');
    summary
}

/// Assembles the message list for each request.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    token_limit: usize,
    preamble: String,
}

impl ContextBuilder {
    /// A builder for a model with `token_limit` tokens of context.
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            preamble: PREAMBLE.to_owned(),
        }
    }

    /// Replace the system preamble.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Change the context window, e.g. after switching provider.
    pub fn set_token_limit(&mut self, token_limit: usize) {
        self.token_limit = token_limit;
    }

    /// Token budget for a whole request.
    pub fn budget(&self) -> usize {
        self.token_limit * BUDGET_FIFTHS / 5
    }

    /// The rendered system prompt.
    pub fn system_prompt(&self, facts: &SessionFacts) -> String {
        let preamble = self.preamble.trim_end();
        if preamble.is_empty() {
            return facts.render();
        }
        format!("{preamble}\n\n{}", facts.render())
    }

    /// Build the messages for one request.
    ///
    /// Returns the system message, an optional summary of pruned history,
    /// the kept history suffix, and `user_text` last when non-empty.
    pub fn build(
        &self,
        facts: &SessionFacts,
        history: &[Message],
        user_text: Option<&str>,
    ) -> Vec<Message> {
        let system = Message::system(self.system_prompt(facts));
        let user = user_text.filter(|text| !text.is_empty()).map(Message::user);

        let mut remaining = self.budget().saturating_sub(system.estimate_tokens());
        if let Some(user) = &user {
            remaining = remaining.saturating_sub(user.estimate_tokens());
        }

        let selection = select(history, remaining);
        remaining -= selection.tokens;

        let mut messages = Vec::with_capacity(history.len() - selection.start + 3);
        messages.push(system);
        if selection.start > 0 {
            let summary = summarize(&history[..selection.start]);
            if estimate_tokens(&summary) <= remaining {
                messages.push(Message::user(summary));
            } else {
                tracing::debug!(
                    "dropping summary of {} messages, {remaining} tokens left",
                    selection.start
                );
            }
        }
        messages.extend_from_slice(&history[selection.start..]);
        messages.extend(user);

        tracing::trace!(
            "context: kept {} of {} history messages, {} tokens",
            history.len() - selection.start,
            history.len(),
            self.budget() - remaining
        );
        messages
    }
}
