use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::proxy::handler::messages_handler;
use crate::AppState;

pub mod handlers;

/// Request bodies above this size are rejected with 413.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/messages", post(messages_handler))
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::liveness))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}

/// Middleware: tags every response with a unique X-Request-Id so clients
/// can correlate failures with bridge logs.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %req_id);

    let mut resp = next.run(req).instrument(span).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
