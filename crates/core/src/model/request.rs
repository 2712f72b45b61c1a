//! Generate request type.

use crate::model::{Message, Tool, ToolChoice};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Output token cap used when neither the request nor the adapter sets one.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A provider-neutral generate request.
///
/// Contains everything needed to make an LLM call. Adapters convert it into
/// their wire format; an empty `model` means the adapter's default model.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Request {
    /// The conversation messages, system first.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// The model to use.
    #[serde(default)]
    pub model: CompactString,

    /// Maximum output tokens; the adapter's configured cap when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// The tools available for this request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,

    /// Controls which tool is called by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl Request {
    /// Create a new request for the given model.
    pub fn new(model: impl Into<CompactString>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the messages for this request.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Set the output token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the tools for this request.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the tool choice for this request.
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// The model id, falling back to `default` when unset.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.model.is_empty() {
            default
        } else {
            &self.model
        }
    }
}
