use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

// ── Response DTOs ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub backend_url: String,
    pub model: String,
    /// Whether a backend key is set. The key itself is never returned.
    pub credential_configured: bool,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /health: static status plus the effective backend settings.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        backend_url: state.config.backend_url.clone(),
        model: state.config.model.clone(),
        credential_configured: state.config.has_credential(),
    })
}

/// GET /healthz: liveness probe.
pub async fn liveness() -> &'static str {
    "ok"
}
