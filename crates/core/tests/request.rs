//! Tests for the provider-neutral request.

use kcore::{Message, Request};

#[test]
fn default_request_is_empty() {
    let request = Request::default();
    assert!(request.messages.is_empty());
    assert!(request.model.is_empty());
    assert_eq!(request.max_tokens, None);
    assert_eq!(request.temperature, None);
    assert!(request.tools.is_empty());
    assert!(request.tool_choice.is_none());
    assert_eq!(request.model_or("llama3.2"), "llama3.2");
}

#[test]
fn builder_sets_fields() {
    let request = Request::new("gpt-4o")
        .with_messages(vec![Message::user("hi")])
        .with_max_tokens(256);
    assert_eq!(request.model_or("llama3.2"), "gpt-4o");
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.max_tokens, Some(256));
}

#[test]
fn empty_object_deserializes_to_default() {
    let request: Request = serde_json::from_str("{}").unwrap();
    assert!(request.messages.is_empty());
    assert!(request.model.is_empty());
    assert_eq!(request.max_tokens, None);
}
