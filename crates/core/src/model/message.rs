//! Conversation messages and content blocks.

use crate::model::ToolCall;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Estimate the number of tokens in a piece of text.
///
/// Uses a fixed heuristic of ~4 bytes per token, rounded down. The value is
/// only meaningful relative to other estimates made the same way.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,

    /// The content of the message.
    pub content: Content,

    /// Optional author name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CompactString>,

    /// The tool call this message answers (tool role only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<CompactString>,
}

impl Message {
    fn new(role: Role, content: Content) -> Self {
        Self {
            role,
            content,
            name: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Content::Text(content.into()))
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Content::Text(content.into()))
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Content::Text(content.into()))
    }

    /// Create an assistant message from content blocks.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, Content::Blocks(blocks))
    }

    /// Create a tool result message answering `call`.
    pub fn tool(call: impl Into<CompactString>, content: impl Into<String>, is_error: bool) -> Self {
        let call = call.into();
        Self {
            tool_call_id: Some(call.clone()),
            ..Self::new(
                Role::Tool,
                Content::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: call,
                    content: content.into(),
                    is_error,
                }]),
            )
        }
    }

    /// Set the author name.
    pub fn with_name(mut self, name: impl Into<CompactString>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The content as blocks, regardless of representation.
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match &self.content {
            Content::Text(text) if text.is_empty() => Vec::new(),
            Content::Text(text) => vec![ContentBlock::Text { text: text.clone() }],
            Content::Blocks(blocks) => blocks.clone(),
        }
    }

    /// Plain text of the message: text blocks and tool result bodies joined
    /// by newlines.
    pub fn text(&self) -> String {
        match &self.content {
            Content::Text(text) => text.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::ToolResult { content, .. } => Some(content.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Tool calls requested in this message.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        let Content::Blocks(blocks) = &self.content else {
            return Vec::new();
        };
        blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Whether the message carries a tool-use block.
    pub fn has_tool_use(&self) -> bool {
        matches!(&self.content, Content::Blocks(blocks)
            if blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. })))
    }

    /// Whether the message carries a tool result.
    pub fn has_tool_result(&self) -> bool {
        self.role == Role::Tool
            || matches!(&self.content, Content::Blocks(blocks)
                if blocks.iter().any(|b| matches!(b, ContentBlock::ToolResult { .. })))
    }

    /// Whether the message carries nothing at all.
    pub fn is_empty(&self) -> bool {
        match &self.content {
            Content::Text(text) => text.is_empty(),
            Content::Blocks(blocks) => blocks.is_empty(),
        }
    }

    /// Estimate the number of tokens in this message.
    ///
    /// Counts text, tool-use names and arguments, and tool result bodies.
    /// Image payloads are not counted.
    pub fn estimate_tokens(&self) -> usize {
        let len = match &self.content {
            Content::Text(text) => text.len(),
            Content::Blocks(blocks) => blocks.iter().map(ContentBlock::text_len).sum(),
        };
        len / 4
    }

    /// Merge `other` into this message.
    ///
    /// Text is joined with a blank line. Non-text blocks of both messages are
    /// kept in order, so merging never loses tool calls or results.
    pub fn merge(&mut self, other: Message) {
        self.content = match (std::mem::take(&mut self.content), other.content) {
            (Content::Text(a), Content::Text(b)) => Content::Text(join(a, &b)),
            (a, b) => {
                let mut blocks = a.into_blocks();
                for block in b.into_blocks() {
                    match (blocks.last_mut(), block) {
                        (Some(ContentBlock::Text { text }), ContentBlock::Text { text: next }) => {
                            *text = join(std::mem::take(text), &next);
                        }
                        (_, block) => blocks.push(block),
                    }
                }
                Content::Blocks(blocks)
            }
        };
    }
}

fn join(mut a: String, b: &str) -> String {
    if a.is_empty() {
        return b.to_owned();
    }
    if !b.is_empty() {
        a.push_str("\n\n");
        a.push_str(b);
    }
    a
}

/// Message content: plain text or an ordered list of typed blocks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// Typed content blocks.
    Blocks(Vec<ContentBlock>),
}

impl Content {
    fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![ContentBlock::Text { text }],
            Self::Blocks(blocks) => blocks,
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// A typed unit of message content.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
    /// Inline image.
    Image {
        /// Source kind, usually "base64".
        source: String,
        /// MIME type, e.g. "image/png".
        media_type: String,
        /// Encoded image data.
        data: String,
    },
    /// A tool invocation requested by the model.
    ToolUse {
        id: CompactString,
        name: CompactString,
        input: Map<String, Value>,
    },
    /// The result of a tool invocation.
    ToolResult {
        tool_use_id: CompactString,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    fn text_len(&self) -> usize {
        match self {
            Self::Text { text } => text.len(),
            Self::Image { .. } => 0,
            Self::ToolUse { name, input, .. } => {
                name.len()
                    + serde_json::to_string(input)
                        .map(|s| s.len())
                        .unwrap_or_default()
            }
            Self::ToolResult { content, .. } => content.len(),
        }
    }
}

/// The role of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The user role
    #[default]
    User,
    /// The assistant role
    Assistant,
    /// The system role
    System,
    /// The tool role
    Tool,
}

impl Role {
    /// Lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}
