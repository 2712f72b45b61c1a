//! Tool abstractions for the unified LLM interface

use compact_str::CompactString;
use schemars::Schema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool for the LLM
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// The name of the tool
    pub name: CompactString,

    /// The description of the tool
    pub description: String,

    /// JSON schema of the tool input
    pub input_schema: Schema,
}

impl Tool {
    /// Create a tool definition.
    pub fn new(
        name: impl Into<CompactString>,
        description: impl Into<String>,
        input_schema: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A finalized tool call made by the model
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ToolCall {
    /// The ID of the tool call
    pub id: CompactString,

    /// The name of the tool to call
    pub name: CompactString,

    /// The decoded arguments
    #[serde(default)]
    pub input: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call.
    pub fn new(
        id: impl Into<CompactString>,
        name: impl Into<CompactString>,
        input: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// String argument `key`, if present.
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }
}

/// Controls which tool is called by the model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model will not call any tool
    None,

    /// Model can pick between generating a message or calling tools
    #[default]
    Auto,

    /// Model must call one or more tools
    Required,

    /// Model must call the specified function
    Function(CompactString),
}

impl From<&str> for ToolChoice {
    fn from(value: &str) -> Self {
        ToolChoice::Function(value.into())
    }
}
