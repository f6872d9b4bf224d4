//! Request and response mapping between the two dialects, plus the backend URL.
//!
//! Both mappers are pure: no I/O, no shared state.

use serde_json::Value;
use thiserror::Error;

use crate::models::chat::{ChatMessage, ChatRequest, ChatResponse};
use crate::models::messages::{
    new_message_id, ContentBlock, InboundBlock, MessageContent, MessagesRequest,
    MessagesResponse, ResponseBlock, Usage,
};
use crate::models::Role;

/// What to do with input the backend dialect cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPolicy {
    /// Drop it silently (logged at debug).
    Ignore,
    /// Fail the mapping; the handler answers 400.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingPolicy {
    /// Messages whose role is not system/user/assistant.
    pub unknown_roles: UnknownPolicy,
    /// Thinking blocks and other non-text blocks sent back by the caller.
    pub non_text_blocks: UnknownPolicy,
}

impl MappingPolicy {
    pub const DEFAULT: MappingPolicy = MappingPolicy {
        unknown_roles: UnknownPolicy::Ignore,
        non_text_blocks: UnknownPolicy::Ignore,
    };

    pub const STRICT: MappingPolicy = MappingPolicy {
        unknown_roles: UnknownPolicy::Reject,
        non_text_blocks: UnknownPolicy::Reject,
    };
}

impl Default for MappingPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("unsupported role '{0}'")]
    UnknownRole(String),
    #[error("unsupported content block in {0} message")]
    UnsupportedBlock(&'static str),
}

/// Backend endpoint for chat completions under the configured base URL.
pub fn completions_url(backend_base: &str) -> String {
    format!("{}/chat/completions", backend_base.trim_end_matches('/'))
}

// ═══════════════════════════════════════════════════════════════
// Messages → Chat Completions (request)
// ═══════════════════════════════════════════════════════════════

/// Map a Messages request onto a Chat Completions request. The caller's model
/// is always replaced by `model`; with `MappingPolicy::DEFAULT` this never fails.
pub fn to_chat_request(
    req: &MessagesRequest,
    model: &str,
    policy: MappingPolicy,
) -> Result<ChatRequest, MappingError> {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);

    if let Some(system) = &req.system {
        let text = flatten_content(system, Role::System, policy)?;
        if !text.is_empty() {
            messages.push(ChatMessage::new(Role::System, text));
        }
    }

    for msg in &req.messages {
        let role = match Role::parse(&msg.role) {
            Some(role) => role,
            None => match policy.unknown_roles {
                UnknownPolicy::Ignore => {
                    tracing::debug!(role = %msg.role, "dropping message with unsupported role");
                    continue;
                }
                UnknownPolicy::Reject => return Err(MappingError::UnknownRole(msg.role.clone())),
            },
        };
        let content = flatten_content(&msg.content, role, policy)?;
        messages.push(ChatMessage::new(role, content));
    }

    Ok(ChatRequest {
        model: model.to_string(),
        messages,
        stream: req.is_streaming(),
        temperature: req.temperature,
        max_tokens: req.max_tokens,
        top_p: req.top_p,
        stop: req.stop.clone().or_else(|| req.stop_sequences.clone()),
    })
}

/// Collapse block content into one string: text blocks joined by newlines,
/// everything else skipped. Scalars are stringified.
fn flatten_content(
    content: &MessageContent,
    role: Role,
    policy: MappingPolicy,
) -> Result<String, MappingError> {
    match content {
        MessageContent::Text(text) => Ok(text.clone()),
        MessageContent::Blocks(blocks) => {
            let mut parts = Vec::with_capacity(blocks.len());
            for block in blocks {
                match block {
                    InboundBlock::Known(ContentBlock::Text { text }) => parts.push(text.as_str()),
                    _ if policy.non_text_blocks == UnknownPolicy::Reject => {
                        return Err(MappingError::UnsupportedBlock(role.as_str()));
                    }
                    _ => {}
                }
            }
            Ok(parts.join("\n"))
        }
        MessageContent::Other(Value::Null) => Ok(String::new()),
        MessageContent::Other(other) => Ok(other.to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════
// Chat Completions → Messages (complete response)
// ═══════════════════════════════════════════════════════════════

/// Map a complete backend response into a Messages response. Only the first
/// choice is considered; reasoning always precedes text.
pub fn to_messages_response(resp: &ChatResponse) -> MessagesResponse {
    let id = resp.id.clone().unwrap_or_else(new_message_id);
    let model = resp.model.clone().unwrap_or_else(|| "unknown".to_string());
    let mut out = MessagesResponse::new(id, model);

    if let Some(usage) = resp.usage {
        out.usage = Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        };
    }

    let Some(choice) = resp.choices.as_ref().and_then(|c| c.first()) else {
        return out;
    };

    if let Some(message) = &choice.message {
        if let Some(reasoning) = message.reasoning_content.as_deref().filter(|s| !s.is_empty()) {
            out.content.push(ResponseBlock::Thinking {
                thinking: reasoning.to_string(),
            });
        }
        if let Some(text) = message.content.as_deref().filter(|s| !s.is_empty()) {
            out.content.push(ResponseBlock::Text {
                text: text.to_string(),
            });
        }
    }

    out.stop_reason = choice.finish_reason.clone().filter(|r| !r.is_empty());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::StopSequences;
    use serde_json::json;

    fn request(value: Value) -> MessagesRequest {
        serde_json::from_value(value).unwrap()
    }

    fn map(req: &MessagesRequest, model: &str) -> ChatRequest {
        to_chat_request(req, model, MappingPolicy::DEFAULT).unwrap()
    }

    fn response(value: Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    // ── Request mapping ─────────────────────────────────────────

    #[test]
    fn test_single_text_block_becomes_plain_content() {
        let req = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "hello"}]}]
        }));

        let mapped = map(&req, "qwen-max-latest");
        let value = serde_json::to_value(&mapped).unwrap();
        assert_eq!(value["messages"], json!([{"role": "user", "content": "hello"}]));
        assert_eq!(value["model"], "qwen-max-latest");
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn test_model_is_always_overridden() {
        let a = request(json!({"model": "claude-3-opus", "messages": [{"role": "user", "content": "x"}]}));
        let b = request(json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "x"}]}));
        assert_eq!(map(&a, "fixed"), map(&b, "fixed"));
        assert_eq!(map(&a, "fixed").model, "fixed");
    }

    #[test]
    fn test_text_blocks_joined_and_thinking_dropped() {
        let req = request(json!({
            "messages": [{
                "role": "assistant",
                "content": [
                    {"type": "thinking", "thinking": "private deliberation"},
                    {"type": "text", "text": "first"},
                    {"type": "image", "source": {}},
                    {"type": "text", "text": "second"}
                ]
            }]
        }));

        let mapped = map(&req, "m");
        assert_eq!(mapped.messages, vec![ChatMessage::new(Role::Assistant, "first\nsecond")]);
    }

    #[test]
    fn test_empty_block_list_maps_to_empty_string() {
        let req = request(json!({"messages": [{"role": "user", "content": []}]}));
        assert_eq!(map(&req, "m").messages[0].content, "");
    }

    #[test]
    fn test_scalar_content_is_stringified() {
        let req = request(json!({
            "messages": [
                {"role": "user", "content": 42},
                {"role": "user", "content": null},
                {"role": "system", "content": "be brief"}
            ]
        }));
        let mapped = map(&req, "m");
        assert_eq!(mapped.messages[0].content, "42");
        assert_eq!(mapped.messages[1].content, "");
        assert_eq!(mapped.messages[2], ChatMessage::new(Role::System, "be brief"));
    }

    #[test]
    fn test_unknown_roles_are_dropped() {
        let req = request(json!({
            "messages": [
                {"role": "user", "content": "a"},
                {"role": "tool", "content": "b"},
                {"role": "developer", "content": "c"},
                {"role": "assistant", "content": "d"}
            ]
        }));
        let mapped = map(&req, "m");
        let roles: Vec<Role> = mapped.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[test]
    fn test_strict_policy_rejects_unknown_role_and_thinking() {
        let req = request(json!({"messages": [{"role": "tool", "content": "b"}]}));
        assert_eq!(
            to_chat_request(&req, "m", MappingPolicy::STRICT),
            Err(MappingError::UnknownRole("tool".into()))
        );

        let req = request(json!({
            "messages": [{"role": "assistant", "content": [{"type": "thinking", "thinking": "t"}]}]
        }));
        assert_eq!(
            to_chat_request(&req, "m", MappingPolicy::STRICT),
            Err(MappingError::UnsupportedBlock("assistant"))
        );
    }

    #[test]
    fn test_sampling_params_copied_only_when_present() {
        let req = request(json!({
            "messages": [],
            "stream": true,
            "temperature": 0.2,
            "max_tokens": 512,
            "top_p": 0.9,
            "stop": ["END"]
        }));
        let mapped = map(&req, "m");
        assert!(mapped.stream);
        assert_eq!(mapped.temperature, Some(0.2));
        assert_eq!(mapped.max_tokens, Some(512));
        assert_eq!(mapped.top_p, Some(0.9));
        assert_eq!(mapped.stop, Some(StopSequences::Many(vec!["END".into()])));

        let bare = map(&request(json!({"messages": []})), "m");
        let value = serde_json::to_value(&bare).unwrap();
        for key in ["temperature", "max_tokens", "top_p", "stop"] {
            assert!(value.get(key).is_none(), "{} should be omitted", key);
        }
    }

    #[test]
    fn test_stop_sequences_used_when_stop_absent() {
        let req = request(json!({"messages": [], "stop_sequences": ["\n\nHuman:"]}));
        assert_eq!(
            map(&req, "m").stop,
            Some(StopSequences::Many(vec!["\n\nHuman:".into()]))
        );

        let both = request(json!({"messages": [], "stop": "A", "stop_sequences": ["B"]}));
        assert_eq!(map(&both, "m").stop, Some(StopSequences::One("A".into())));
    }

    #[test]
    fn test_top_level_system_becomes_leading_message() {
        let req = request(json!({
            "system": [{"type": "text", "text": "You are terse."}],
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let mapped = map(&req, "m");
        assert_eq!(
            mapped.messages,
            vec![
                ChatMessage::new(Role::System, "You are terse."),
                ChatMessage::new(Role::User, "hi"),
            ]
        );
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        assert_eq!(
            completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:8080/v1"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    // ── Response mapping ────────────────────────────────────────

    #[test]
    fn test_reasoning_and_text_map_to_two_blocks_in_order() {
        let resp = response(json!({
            "id": "chatcmpl-1",
            "model": "qwen-max-latest",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "The answer is 4.", "reasoning_content": "2 + 2"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 9, "total_tokens": 21}
        }));

        let mapped = to_messages_response(&resp);
        assert_eq!(
            mapped.content,
            vec![
                ResponseBlock::Thinking { thinking: "2 + 2".into() },
                ResponseBlock::Text { text: "The answer is 4.".into() },
            ]
        );
        assert_eq!(mapped.id, "chatcmpl-1");
        assert_eq!(mapped.model, "qwen-max-latest");
        assert_eq!(mapped.stop_reason.as_deref(), Some("stop"));
        assert_eq!(mapped.usage, Usage { input_tokens: 12, output_tokens: 9 });
    }

    #[test]
    fn test_response_wire_shape() {
        let resp = response(json!({
            "id": "chatcmpl-2",
            "model": "m",
            "choices": [{"message": {"content": "hi"}, "finish_reason": "length"}]
        }));
        assert_eq!(
            serde_json::to_value(to_messages_response(&resp)).unwrap(),
            json!({
                "id": "chatcmpl-2",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "hi"}],
                "model": "m",
                "stop_reason": "length",
                "stop_sequence": null,
                "usage": {"input_tokens": 0, "output_tokens": 0}
            })
        );
    }

    #[test]
    fn test_empty_fields_produce_no_blocks() {
        let resp = response(json!({
            "id": "x",
            "choices": [{"message": {"content": "", "reasoning_content": ""}}]
        }));
        let mapped = to_messages_response(&resp);
        assert!(mapped.content.is_empty());
        assert_eq!(mapped.stop_reason, None);
        assert_eq!(mapped.model, "unknown");
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let resp = response(json!({
            "id": "x",
            "choices": [
                {"message": {"content": "first"}, "finish_reason": "stop"},
                {"message": {"content": "second"}, "finish_reason": "length"}
            ]
        }));
        let mapped = to_messages_response(&resp);
        assert_eq!(mapped.content, vec![ResponseBlock::Text { text: "first".into() }]);
        assert_eq!(mapped.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_empty_finish_reason_is_no_stop_reason() {
        let resp = response(json!({
            "choices": [{"message": {"content": "hi"}, "finish_reason": ""}]
        }));
        assert_eq!(to_messages_response(&resp).stop_reason, None);
    }

    #[test]
    fn test_missing_choices_and_id() {
        let mapped = to_messages_response(&response(json!({})));
        assert!(mapped.content.is_empty());
        assert!(mapped.id.starts_with("msg_"));
        assert_eq!(mapped.usage, Usage::default());
    }
}
