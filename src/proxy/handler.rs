use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::errors::AppError;
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::models::messages::{new_message_id, MessagesRequest};
use crate::proxy::stream::StreamTranslator;
use crate::proxy::stream_bridge::translate_sse_stream;
use crate::proxy::transform::{to_chat_request, to_messages_response, MappingPolicy};
use crate::AppState;

/// `POST /v1/messages`: translate one Messages call to the backend and back.
#[tracing::instrument(skip(state, body), fields(stream = tracing::field::Empty))]
pub async fn messages_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let start = Instant::now();

    let request: MessagesRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid JSON in request body: {}", e)))?;

    if !state.config.has_credential() {
        tracing::error!("OPENAI_API_KEY is not configured");
        return Err(AppError::MissingCredential);
    }

    let chat = to_chat_request(&request, &state.config.model, MappingPolicy::DEFAULT)
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    tracing::Span::current().record("stream", chat.stream);
    tracing::info!(
        requested_model = request.model.as_deref().unwrap_or("-"),
        backend_model = %chat.model,
        messages = chat.messages.len(),
        "forwarding messages request"
    );

    let response = if chat.stream {
        stream_response(state, chat)
    } else {
        complete_response(&state, &chat).await?
    };

    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "response headers ready");
    Ok(response)
}

/// Non-streaming path: one backend call, one translated JSON body.
async fn complete_response(state: &AppState, chat: &ChatRequest) -> Result<Response, AppError> {
    let upstream = state.upstream.send_chat(chat).await?;

    let status = upstream.status();
    if !status.is_success() {
        let body = upstream.text().await.unwrap_or_default();
        tracing::warn!(%status, body = %body, "backend returned error");
        return Err(AppError::Backend { status, body });
    }

    let bytes = upstream.bytes().await.map_err(AppError::from_transport)?;
    let parsed: ChatResponse =
        serde_json::from_slice(&bytes).map_err(|e| AppError::Decode(e.to_string()))?;

    let message = to_messages_response(&parsed);
    tracing::info!(
        stop_reason = message.stop_reason.as_deref().unwrap_or("-"),
        output_tokens = message.usage.output_tokens,
        "completed messages request"
    );
    Ok(Json(message).into_response())
}

/// Streaming path: the response (status 200 and headers) goes out at once;
/// backend failures after this point arrive as an in-band `error` event.
fn stream_response(state: Arc<AppState>, chat: ChatRequest) -> Response {
    let (translator, first_event) = StreamTranslator::open(new_message_id(), chat.model.clone());
    let named = state.config.sse_event_names;

    let pending = async move { state.upstream.send_chat(&chat).await };
    let body: Body = translate_sse_stream(pending, translator, first_event, named);

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
