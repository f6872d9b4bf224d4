//! Stream bridge: pumps a backend SSE response through a [`StreamTranslator`]
//! into an axum response body.
//!
//! [`translate_sse_stream`] returns the body immediately. A background task
//! sends `message_start`, then waits for the backend connection and forwards
//! translated frames as each backend event is decoded. If the client goes
//! away the task is cancelled, which drops the backend connection with it.

use std::future::Future;

use axum::body::Body;
use bytes::Bytes;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::errors::AppError;
use crate::models::messages::TranslatedEvent;
use crate::proxy::stream::{StreamInput, StreamTranslator};

type FrameSender = mpsc::Sender<Result<Bytes, std::io::Error>>;

/// Serialize one event as an SSE frame. `message_stop` is followed by the
/// `data: [DONE]` sentinel.
pub fn sse_frame(event: &TranslatedEvent, named: bool) -> Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize stream event");
        r#"{"type":"error","error":{"type":"api_error","message":"event serialization failed"}}"#
            .to_string()
    });

    let mut frame = String::with_capacity(payload.len() + 32);
    if named {
        frame.push_str("event: ");
        frame.push_str(event.event_name());
        frame.push('\n');
    }
    frame.push_str("data: ");
    frame.push_str(&payload);
    frame.push_str("\n\n");
    if matches!(event, TranslatedEvent::StreamEnd) {
        frame.push_str("data: [DONE]\n\n");
    }
    Bytes::from(frame)
}

/// Build a streaming body for one translated call.
///
/// `pending` is the in-flight backend request. It is awaited inside the
/// background task so `first_event` reaches the client before the backend
/// has answered.
pub fn translate_sse_stream<F>(
    pending: F,
    translator: StreamTranslator,
    first_event: TranslatedEvent,
    named_events: bool,
) -> Body
where
    F: Future<Output = Result<reqwest::Response, AppError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(64);

    tokio::spawn(async move {
        tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("client disconnected, abandoning backend stream");
            }
            _ = drive(pending, translator, first_event, named_events, &tx) => {}
        }
    });

    Body::from_stream(tokio_stream::wrappers::ReceiverStream::new(rx))
}

async fn drive<F>(
    pending: F,
    mut translator: StreamTranslator,
    first_event: TranslatedEvent,
    named: bool,
    tx: &FrameSender,
) where
    F: Future<Output = Result<reqwest::Response, AppError>>,
{
    if !send_events(tx, std::slice::from_ref(&first_event), named).await {
        return;
    }

    let response = match pending.await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "backend request failed before streaming began");
            let events = translator.advance(StreamInput::TransportError(e.to_string()));
            send_events(tx, &events, named).await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%status, body = %body, "backend rejected streaming request");
        let events = translator.advance(StreamInput::TransportError(format!(
            "backend returned {}: {}",
            status, body
        )));
        send_events(tx, &events, named).await;
        return;
    }

    pump(response.bytes_stream().eventsource(), translator, named, tx).await;
}

/// Feed decoded backend events through the translator until a terminal event
/// is sent, the backend closes, or the client disconnects.
pub(crate) async fn pump<S, E>(
    events: S,
    mut translator: StreamTranslator,
    named: bool,
    tx: &FrameSender,
) where
    S: Stream<Item = Result<Event, EventStreamError<E>>>,
    E: std::fmt::Display,
{
    tokio::pin!(events);

    while let Some(item) = events.next().await {
        let out = match item {
            Ok(event) => translator.push_data(&event.data),
            Err(EventStreamError::Transport(e)) => {
                tracing::warn!(error = %e, "backend stream interrupted");
                translator.advance(StreamInput::TransportError(e.to_string()))
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable backend frame");
                continue;
            }
        };

        if !send_events(tx, &out, named).await || translator.is_done() {
            return;
        }
    }

    if !translator.is_done() {
        tracing::warn!("backend stream closed without [DONE], ending stream");
        let out = translator.advance(StreamInput::Done);
        send_events(tx, &out, named).await;
    }
}

/// Returns false once the client has gone away.
async fn send_events(tx: &FrameSender, events: &[TranslatedEvent], named: bool) -> bool {
    for event in events {
        if tx.send(Ok(sse_frame(event, named))).await.is_err() {
            return false;
        }
    }
    true
}
