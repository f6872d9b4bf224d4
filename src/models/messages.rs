//! Messages wire types (the caller-facing dialect).
//!
//! Requests arrive as content blocks or plain strings; responses and stream
//! events are produced in the block-structured shape clients expect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::chat::StopSequences;

// ── Inbound request ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesRequest {
    /// Requested model. Read for logging only; the bridge always sends its
    /// configured model upstream.
    pub model: Option<String>,
    pub system: Option<MessageContent>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    pub stream: Option<bool>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub stop: Option<StopSequences>,
    pub stop_sequences: Option<StopSequences>,
}

impl MessagesRequest {
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Kept as a raw string so unrecognized roles survive parsing and can be
    /// handled by policy instead of failing the whole request.
    pub role: String,
    #[serde(default)]
    pub content: MessageContent,
}

/// `content` is either a plain string or an ordered list of blocks.
/// Anything else is kept verbatim and stringified during mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<InboundBlock>),
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Blocks(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundBlock {
    Known(ContentBlock),
    /// A block without a `type` tag.
    Untyped(Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    /// image, tool_use, tool_result, ...
    #[serde(other)]
    Unsupported,
}

// ── Complete response ───────────────────────────────────────────

/// A complete assistant message. Also the payload of `message_start`, where
/// it is sent with empty content and zero usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub content: Vec<ResponseBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

impl MessagesResponse {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "message",
            role: "assistant",
            content: Vec::new(),
            model: model.into(),
            stop_reason: None,
            stop_sequence: None,
            usage: Usage::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Thinking { thinking: String },
    Text { text: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Generate a message id in the `msg_...` form clients expect.
pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

// ── Stream events ───────────────────────────────────────────────

/// The two block kinds a translated stream can carry. Each has a fixed
/// index for the lifetime of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Thinking,
    Text,
}

impl BlockKind {
    pub fn index(self) -> u32 {
        match self {
            BlockKind::Thinking => 0,
            BlockKind::Text => 1,
        }
    }
}

/// One event of a translated stream, serialized as the `data:` payload of
/// an SSE frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranslatedEvent {
    MessageStart {
        message: MessagesResponse,
    },
    ContentBlockStart {
        index: u32,
        content_block: ResponseBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: StopInfo,
        usage: DeltaUsage,
    },
    #[serde(rename = "message_stop")]
    StreamEnd,
    Error {
        error: ErrorDetail,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    ThinkingDelta { thinking: String },
    TextDelta { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopInfo {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeltaUsage {
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl TranslatedEvent {
    pub fn message_start(id: impl Into<String>, model: impl Into<String>) -> Self {
        TranslatedEvent::MessageStart {
            message: MessagesResponse::new(id, model),
        }
    }

    pub fn block_start(kind: BlockKind) -> Self {
        let content_block = match kind {
            BlockKind::Thinking => ResponseBlock::Thinking {
                thinking: String::new(),
            },
            BlockKind::Text => ResponseBlock::Text {
                text: String::new(),
            },
        };
        TranslatedEvent::ContentBlockStart {
            index: kind.index(),
            content_block,
        }
    }

    pub fn block_delta(kind: BlockKind, fragment: impl Into<String>) -> Self {
        let delta = match kind {
            BlockKind::Thinking => BlockDelta::ThinkingDelta {
                thinking: fragment.into(),
            },
            BlockKind::Text => BlockDelta::TextDelta {
                text: fragment.into(),
            },
        };
        TranslatedEvent::ContentBlockDelta {
            index: kind.index(),
            delta,
        }
    }

    pub fn block_stop(kind: BlockKind) -> Self {
        TranslatedEvent::ContentBlockStop {
            index: kind.index(),
        }
    }

    pub fn message_delta(stop_reason: impl Into<String>, output_tokens: u64) -> Self {
        TranslatedEvent::MessageDelta {
            delta: StopInfo {
                stop_reason: Some(stop_reason.into()),
                stop_sequence: None,
            },
            usage: DeltaUsage { output_tokens },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TranslatedEvent::Error {
            error: ErrorDetail {
                kind: "api_error".to_string(),
                message: message.into(),
            },
        }
    }

    /// The `type` tag, also used as the SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            TranslatedEvent::MessageStart { .. } => "message_start",
            TranslatedEvent::ContentBlockStart { .. } => "content_block_start",
            TranslatedEvent::ContentBlockDelta { .. } => "content_block_delta",
            TranslatedEvent::ContentBlockStop { .. } => "content_block_stop",
            TranslatedEvent::MessageDelta { .. } => "message_delta",
            TranslatedEvent::StreamEnd => "message_stop",
            TranslatedEvent::Error { .. } => "error",
        }
    }

    /// True for `StreamEnd` and `Error`, after which nothing else is sent.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranslatedEvent::StreamEnd | TranslatedEvent::Error { .. }
        )
    }
}
