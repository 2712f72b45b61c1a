//! Per-adapter model list and limits.

use compact_str::CompactString;
use kcore::{Request, default_context_limit, model::DEFAULT_MAX_TOKENS};

/// Models an adapter serves and the limits used for budget math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Model used when a request leaves `model` empty.
    pub default_model: CompactString,
    /// Additional models the adapter can serve.
    pub models: Vec<CompactString>,
    /// Explicit context window, overriding the known-family table.
    pub context_limit: Option<usize>,
    /// Output token cap used when a request sets none.
    pub max_tokens: Option<u32>,
}

impl Catalog {
    /// A catalog serving `default_model`.
    pub fn new(default_model: impl Into<CompactString>) -> Self {
        Self {
            default_model: default_model.into(),
            models: Vec::new(),
            context_limit: None,
            max_tokens: None,
        }
    }

    /// Set the additional models.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Set an explicit context window.
    pub fn with_context_limit(mut self, limit: Option<usize>) -> Self {
        self.context_limit = limit;
        self
    }

    /// Set the default output cap.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Default model first, then the rest without duplicates.
    pub fn available(&self) -> Vec<CompactString> {
        let mut models = vec![self.default_model.clone()];
        for model in &self.models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }

    /// Context window of the default model.
    pub fn token_limit(&self) -> usize {
        self.context_limit
            .unwrap_or_else(|| default_context_limit(&self.default_model))
    }

    /// Model id for `request`.
    pub fn model<'r>(&'r self, request: &'r Request) -> &'r str {
        request.model_or(&self.default_model)
    }

    /// Output cap for `request`.
    pub fn max_tokens(&self, request: &Request) -> u32 {
        request
            .max_tokens
            .or(self.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }
}
