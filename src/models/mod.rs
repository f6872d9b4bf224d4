//! Wire types for both dialects.
//!
//! [`messages`] is the caller-facing Messages dialect, [`chat`] is the
//! backend Chat Completions dialect. Conversion lives in `proxy::transform`
//! and `proxy::stream`.

use serde::{Deserialize, Serialize};

pub mod chat;
pub mod messages;

/// Conversation roles understood on both sides of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Recognize a role string. Anything else is `None` and handled by
    /// `MappingPolicy::unknown_roles`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    /// Wire name, as serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}
