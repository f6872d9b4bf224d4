use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend API key not configured")]
    MissingCredential,

    #[error("backend returned {status}")]
    Backend { status: StatusCode, body: String },

    #[error("backend request timed out")]
    Timeout,

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Classify a reqwest failure: deadline expiry is reported separately
    /// from connect/transport failures.
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout
        } else {
            AppError::Upstream(e.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, msg) = match &self {
            AppError::InvalidRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                reason.clone(),
            ),
            AppError::MissingCredential => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                "backend API key not configured".to_string(),
            ),
            AppError::Backend { status, body } => (*status, "api_error", body.clone()),
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "timeout_error",
                "backend request timed out".to_string(),
            ),
            AppError::Upstream(e) => (StatusCode::BAD_GATEWAY, "api_error", e.clone()),
            AppError::Decode(e) => {
                tracing::error!("Backend response decode error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "api_error",
                    format!("failed to decode backend response: {}", e),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "api_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "type": "error",
            "error": {
                "type": error_type,
                "message": msg,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_is_400() {
        let resp = AppError::InvalidRequest("Invalid JSON in request body".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["message"], "Invalid JSON in request body");
    }

    #[tokio::test]
    async fn test_backend_status_and_body_pass_through() {
        let resp = AppError::Backend {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: r#"{"error":{"message":"slow down"}}"#.into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], r#"{"error":{"message":"slow down"}}"#);
    }

    #[tokio::test]
    async fn test_missing_credential_is_server_error() {
        let resp = AppError::MissingCredential.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let resp = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "internal server error");
    }

    #[tokio::test]
    async fn test_timeout_is_408() {
        let resp = AppError::Timeout.into_response();
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body_json(resp).await["error"]["type"], "timeout_error");
    }
}
