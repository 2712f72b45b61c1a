//! Request body for the Gemini `generateContent` API.

use crate::Catalog;
use compact_str::CompactString;
use kcore::{Content, ContentBlock, Message, Role, Tool, ToolChoice, alternate};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;

/// The request body for `generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Alternating `user`/`model` turns.
    pub contents: Vec<Value>,
    /// Out-of-band system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Value>,
    /// Function declarations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    /// Function calling mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<Value>,
    /// Output limits and sampling.
    pub generation_config: Value,
}

impl Request {
    /// Convert a generic request.
    ///
    /// Function responses belong to user turns, so tool results move to the
    /// user role before alternation.
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

        let mut names = HashMap::new();
        let contents = alternated
            .turns
            .iter()
            .map(|turn| wire_content(turn, &mut names))
            .collect();

        let declarations: Vec<Value> = request.tools.iter().map(wire_tool).collect();
        let mut generation_config = json!({ "maxOutputTokens": catalog.max_tokens(request) });
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = json!(temperature);
        }

        Self {
            contents,
            system_instruction: alternated
                .system
                .map(|text| json!({"parts": [{"text": text}]})),
            tools: if declarations.is_empty() {
                Vec::new()
            } else {
                vec![json!({ "functionDeclarations": declarations })]
            },
            tool_config: request.tool_choice.as_ref().map(wire_tool_config),
            generation_config,
        }
    }
}

/// Render one turn. `names` maps tool-use ids to function names, which
/// Gemini requires on function responses.
fn wire_content(message: &Message, names: &mut HashMap<CompactString, CompactString>) -> Value {
    let role = match message.role {
        Role::User => "user",
        _ => "model",
    };
    let parts: Vec<Value> = match &message.content {
        Content::Text(text) => vec![json!({ "text": text })],
        Content::Blocks(blocks) => blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => json!({ "text": text }),
                ContentBlock::Image {
                    media_type, data, ..
                } => json!({"inlineData": {"mimeType": media_type, "data": data}}),
                ContentBlock::ToolUse { id, name, input } => {
                    names.insert(id.clone(), name.clone());
                    json!({"functionCall": {"name": name, "args": input}})
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => match names.get(tool_use_id) {
                    Some(name) => {
                        let key = if *is_error { "error" } else { "content" };
                        json!({"functionResponse": {"name": name, "response": { key: content }}})
                    }
                    None => json!({ "text": format!("Tool result: {content}") }),
                },
            })
            .collect(),
    };
    json!({ "role": role, "parts": parts })
}

fn wire_tool(tool: &Tool) -> Value {
    let mut parameters = serde_json::to_value(&tool.input_schema).unwrap_or_default();
    if let Some(object) = parameters.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": parameters,
    })
}

fn wire_tool_config(choice: &ToolChoice) -> Value {
    let config = match choice {
        ToolChoice::None => json!({"mode": "NONE"}),
        ToolChoice::Auto => json!({"mode": "AUTO"}),
        ToolChoice::Required => json!({"mode": "ANY"}),
        ToolChoice::Function(name) => json!({"mode": "ANY", "allowedFunctionNames": [name]}),
    };
    json!({ "functionCallingConfig": config })
}
