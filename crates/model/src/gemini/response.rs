//! Gemini `generateContent` response.

use crate::tool_id;
use compact_str::CompactString;
use kcore::{Response, StopReason, ToolCall, Usage};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Raw `generateContent` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Raw {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: CompactString,
    #[serde(default)]
    response_id: CompactString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<CompactString>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: CompactString,
    #[serde(default)]
    args: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl Raw {
    /// Convert to the unified response, reading the first candidate.
    ///
    /// Gemini does not assign call ids, so each call gets a generated one.
    pub fn into_response(self, latency: Duration) -> Response {
        let usage = self
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut stop_reason = StopReason::EndTurn;
        if let Some(candidate) = self.candidates.into_iter().next() {
            stop_reason = candidate
                .finish_reason
                .as_deref()
                .map(StopReason::parse)
                .unwrap_or_default();
            for part in candidate.content.unwrap_or_default().parts {
                if let Some(text) = part.text {
                    content.push_str(&text);
                }
                if let Some(call) = part.function_call {
                    tool_calls.push(ToolCall::new(tool_id(), call.name, call.args));
                }
            }
        }
        if !tool_calls.is_empty() {
            stop_reason = StopReason::ToolUse;
        }

        Response {
            id: self.response_id,
            model: self.model_version,
            content,
            tool_calls,
            stop_reason,
            usage,
            latency,
        }
    }
}
