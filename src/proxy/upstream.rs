//! HTTP client for the Chat Completions backend.
//!
//! One attempt per call; failures are reported, never retried.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderValue, CONTENT_TYPE};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::chat::ChatRequest;
use crate::proxy::transform::completions_url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(32)
            // Covers the whole call, streamed body included.
            .timeout(config.request_timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            url: completions_url(&config.backend_url),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one chat request. Returns the raw response whatever its status;
    /// callers decide how to surface non-2xx answers.
    pub async fn send_chat(&self, request: &ChatRequest) -> Result<reqwest::Response, AppError> {
        let api_key = self.api_key.as_deref().ok_or(AppError::MissingCredential)?;

        let body = serde_json::to_vec(request).map_err(|e| AppError::Internal(e.into()))?;

        self.client
            .post(&self.url)
            .bearer_auth(api_key)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %self.url, error = %e, "backend request failed");
                AppError::from_transport(e)
            })
    }
}
