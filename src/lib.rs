//! msgbridge: serves the Messages API on top of a Chat Completions backend.
//!
//! Library crate so integration tests in `tests/` can build the router
//! without binding a socket.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod proxy;

/// Shared application state passed to handlers.
pub struct AppState {
    pub config: config::Config,
    pub upstream: proxy::upstream::UpstreamClient,
}

impl AppState {
    pub fn new(config: config::Config) -> anyhow::Result<Self> {
        let upstream = proxy::upstream::UpstreamClient::new(&config)?;
        Ok(Self { config, upstream })
    }
}
