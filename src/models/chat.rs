//! Chat Completions wire types (the backend dialect).
//!
//! Outbound requests are fully typed. Inbound responses and stream chunks are
//! deliberately lenient: every field is optional so that a backend that omits
//! or nulls a field still parses.

use serde::{Deserialize, Serialize};

use crate::models::Role;

// ── Outbound request ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// `stop` accepts either a single string or a list of strings on both dialects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

// ── Complete response ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    pub id: Option<String>,
    pub model: Option<String>,
    pub choices: Option<Vec<Choice>>,
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    pub message: Option<AssistantMessage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

// ── Stream chunk ────────────────────────────────────────────────

/// One `data: {...}` payload of a streaming response.
/// Format: {"choices":[{"delta":{"reasoning_content":"..","content":".."},"finish_reason":null}]}
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    pub choices: Option<Vec<ChunkChoice>>,
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    pub delta: Option<ChunkDelta>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
}

impl ChunkDelta {
    /// Reasoning fragment, if present and non-empty.
    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning_content.as_deref().filter(|s| !s.is_empty())
    }

    /// Answer fragment, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|s| !s.is_empty())
    }
}
