//! Chat Completions stream → Messages stream translation.
//!
//! [`StreamTranslator`] consumes backend stream payloads one at a time and
//! yields the Messages events each one produces. It never buffers the
//! response: every input is translated as soon as it arrives.
//!
//! Block layout is fixed. Reasoning goes to block 0, answer text to block 1,
//! and block 0 is always stopped before block 1 starts.

use crate::models::chat::{ChatChunk, ChunkChoice};
use crate::models::messages::{BlockKind, TranslatedEvent};

/// Stop reason reported when the backend ends a stream without one.
pub const END_TURN: &str = "end_turn";

/// One decoded backend stream item.
#[derive(Debug)]
pub enum StreamInput {
    Chunk(ChatChunk),
    /// The `[DONE]` sentinel.
    Done,
    /// The connection to the backend failed mid-stream.
    TransportError(String),
}

impl StreamInput {
    /// Decode the payload of one SSE `data:` field.
    /// Returns `None` for payloads that are neither `[DONE]` nor a chunk object.
    pub fn from_data(data: &str) -> Option<Self> {
        let data = data.trim();
        if data == "[DONE]" {
            return Some(StreamInput::Done);
        }
        serde_json::from_str::<ChatChunk>(data)
            .ok()
            .map(StreamInput::Chunk)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Pending,
    Open,
    Closed,
}

/// Per-stream translation state. Created once per streaming call and dropped
/// with it; never shared between tasks.
#[derive(Debug)]
pub struct StreamTranslator {
    thinking: BlockState,
    text: BlockState,
    /// A finish_reason has been seen; later content is dropped.
    finished: bool,
    /// StreamEnd or Error has been emitted.
    ended: bool,
    /// Last completion token count the backend reported, if any.
    output_tokens: u64,
}

impl StreamTranslator {
    /// Start a stream. The returned `MessageStart` must be sent before any
    /// event produced by [`advance`](Self::advance).
    pub fn open(message_id: impl Into<String>, model: impl Into<String>) -> (Self, TranslatedEvent) {
        let translator = Self {
            thinking: BlockState::Pending,
            text: BlockState::Pending,
            finished: false,
            ended: false,
            output_tokens: 0,
        };
        (translator, TranslatedEvent::message_start(message_id, model))
    }

    /// True once a terminal event has been emitted.
    pub fn is_done(&self) -> bool {
        self.ended
    }

    /// Translate the payload of one SSE `data:` field. Malformed payloads
    /// are skipped without ending the stream.
    pub fn push_data(&mut self, data: &str) -> Vec<TranslatedEvent> {
        match StreamInput::from_data(data) {
            Some(input) => self.advance(input),
            None => {
                tracing::debug!(payload = %data, "skipping malformed stream payload");
                Vec::new()
            }
        }
    }

    /// Apply one input and return the events it produces, in order.
    /// After a terminal event every further input yields nothing.
    pub fn advance(&mut self, input: StreamInput) -> Vec<TranslatedEvent> {
        if self.ended {
            return Vec::new();
        }

        let mut out = Vec::new();
        match input {
            StreamInput::Chunk(chunk) => self.on_chunk(&chunk, &mut out),
            StreamInput::Done => self.on_done(&mut out),
            // Open blocks are left unclosed: Error is a hard stop.
            StreamInput::TransportError(message) => {
                self.ended = true;
                out.push(TranslatedEvent::error(message));
            }
        }
        out
    }

    fn on_chunk(&mut self, chunk: &ChatChunk, out: &mut Vec<TranslatedEvent>) {
        if let Some(usage) = chunk.usage {
            self.output_tokens = usage.completion_tokens;
        }
        for choice in chunk.choices.iter().flatten() {
            self.on_choice(choice, out);
        }
    }

    fn on_choice(&mut self, choice: &ChunkChoice, out: &mut Vec<TranslatedEvent>) {
        if let Some(delta) = &choice.delta {
            if let Some(reasoning) = delta.reasoning() {
                self.on_reasoning(reasoning, out);
            }
            if let Some(text) = delta.text() {
                self.on_text(text, out);
            }
        }

        if let Some(reason) = choice.finish_reason.as_deref().filter(|r| !r.is_empty()) {
            self.on_finish(reason, out);
        }
    }

    fn on_reasoning(&mut self, fragment: &str, out: &mut Vec<TranslatedEvent>) {
        // Reasoning can only lead: once text has started (or the message
        // finished) block 0 cannot be opened or reopened.
        if self.finished || self.text != BlockState::Pending || self.thinking == BlockState::Closed {
            tracing::debug!("dropping reasoning fragment received after text or finish");
            return;
        }

        if self.thinking == BlockState::Pending {
            out.push(TranslatedEvent::block_start(BlockKind::Thinking));
            self.thinking = BlockState::Open;
        }
        out.push(TranslatedEvent::block_delta(BlockKind::Thinking, fragment));
    }

    fn on_text(&mut self, fragment: &str, out: &mut Vec<TranslatedEvent>) {
        if self.finished {
            tracing::debug!("dropping text fragment received after finish_reason");
            return;
        }

        if self.thinking == BlockState::Open {
            out.push(TranslatedEvent::block_stop(BlockKind::Thinking));
            self.thinking = BlockState::Closed;
        }
        if self.text == BlockState::Pending {
            out.push(TranslatedEvent::block_start(BlockKind::Text));
            self.text = BlockState::Open;
        }
        out.push(TranslatedEvent::block_delta(BlockKind::Text, fragment));
    }

    fn on_finish(&mut self, reason: &str, out: &mut Vec<TranslatedEvent>) {
        self.close_open_blocks(out);
        self.finished = true;
        out.push(TranslatedEvent::message_delta(reason, self.output_tokens));
    }

    /// A stream that ends without any finish_reason is finished as
    /// `end_turn` so every started block is stopped before `message_stop`.
    fn on_done(&mut self, out: &mut Vec<TranslatedEvent>) {
        if !self.finished {
            self.on_finish(END_TURN, out);
        }
        self.ended = true;
        out.push(TranslatedEvent::StreamEnd);
    }

    fn close_open_blocks(&mut self, out: &mut Vec<TranslatedEvent>) {
        if self.thinking == BlockState::Open {
            out.push(TranslatedEvent::block_stop(BlockKind::Thinking));
            self.thinking = BlockState::Closed;
        }
        if self.text == BlockState::Open {
            out.push(TranslatedEvent::block_stop(BlockKind::Text));
            self.text = BlockState::Closed;
        }
    }
}
