//! Request body for the Anthropic Messages API.

use crate::Catalog;
use compact_str::CompactString;
use kcore::{ContentBlock, Content, Message, Role, Tool, ToolChoice, alternate};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashSet;

/// The request body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: CompactString,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// System prompt (top-level, not in messages array).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The messages array (Anthropic content block format).
    pub messages: Vec<Value>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    /// Tool choice control.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Request {
    /// Convert a generic request.
    ///
    /// Tool results travel as `tool_result` blocks in user turns, so they are
    /// moved to the user role before alternation.
    pub fn new(request: &kcore::Request, catalog: &Catalog) -> Self {
        let messages: Vec<Message> = request
            .messages
            .iter()
            .cloned()
            .map(|mut message| {
                if message.role == Role::Tool {
                    message.role = Role::User;
                }
                message
            })
            .collect();
        let alternated = alternate(&messages);

        let mut seen = HashSet::new();
        let messages = alternated
            .turns
            .iter()
            .map(|turn| wire_message(turn, &mut seen))
            .collect();

        Self {
            model: catalog.model(request).into(),
            max_tokens: catalog.max_tokens(request),
            system: alternated.system,
            messages,
            stream: None,
            tools: request.tools.iter().map(wire_tool).collect(),
            tool_choice: request.tool_choice.as_ref().map(wire_tool_choice),
            temperature: request.temperature,
        }
    }

    /// Enable streaming for the request.
    pub fn stream(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

/// Render one turn. `seen` collects tool-use ids so a result whose call was
/// pruned from the context degrades to plain text instead of an orphan.
fn wire_message(message: &Message, seen: &mut HashSet<CompactString>) -> Value {
    let role = message.role.as_str();
    let blocks = match &message.content {
        Content::Text(text) => return json!({ "role": role, "content": text }),
        Content::Blocks(blocks) => blocks,
    };

    let mut content: Vec<Value> = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } if text.is_empty() => None,
            ContentBlock::Text { text } => Some(json!({"type": "text", "text": text})),
            ContentBlock::Image {
                source,
                media_type,
                data,
            } => Some(json!({
                "type": "image",
                "source": {"type": source, "media_type": media_type, "data": data},
            })),
            ContentBlock::ToolUse { id, name, input } => {
                seen.insert(id.clone());
                Some(json!({"type": "tool_use", "id": id, "name": name, "input": input}))
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } if seen.contains(tool_use_id) => Some(json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            })),
            ContentBlock::ToolResult { content, .. } => {
                Some(json!({"type": "text", "text": format!("Tool result: {content}")}))
            }
        })
        .collect();

    if content.is_empty() {
        content.push(json!({"type": "text", "text": ""}));
    }
    json!({ "role": role, "content": content })
}

fn wire_tool(tool: &Tool) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn wire_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::None => json!({"type": "none"}),
        ToolChoice::Auto => json!({"type": "auto"}),
        ToolChoice::Required => json!({"type": "any"}),
        ToolChoice::Function(name) => json!({"type": "tool", "name": name}),
    }
}
