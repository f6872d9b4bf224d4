use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_BACKEND_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "qwen-max-latest";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the Chat Completions backend, e.g. `https://api.openai.com/v1`.
    /// Set via OPENAI_API_URL.
    pub backend_url: String,
    /// Bearer credential for the backend. Set via OPENAI_API_KEY.
    /// Empty is treated as unset.
    pub api_key: Option<String>,
    /// Every outbound request uses this model, whatever the caller asked for.
    /// Set via BRIDGE_MODEL. Default: qwen-max-latest.
    pub model: String,
    /// Overall deadline for one backend call, streaming included.
    /// Set via BRIDGE_REQUEST_TIMEOUT_SECS. Default: 300.
    pub request_timeout_secs: u64,
    /// Prefix each streamed frame with an `event:` line.
    /// Set via BRIDGE_SSE_EVENT_NAMES. Default: false.
    pub sse_event_names: bool,
}

impl Config {
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build a config from an arbitrary key lookup. `load` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("OPENAI_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.into());

        let parsed = url::Url::parse(&backend_url)
            .with_context(|| format!("OPENAI_API_URL is not a valid URL: {}", backend_url))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!(
                "OPENAI_API_URL must use http or https, got '{}'",
                parsed.scheme()
            );
        }

        Ok(Config {
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            backend_url,
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            model: lookup("BRIDGE_MODEL")
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            request_timeout_secs: lookup("BRIDGE_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            sse_event_names: lookup("BRIDGE_SSE_EVENT_NAMES")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    Config::from_lookup(|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.backend_url, "https://api.openai.com/v1");
        assert_eq!(cfg.model, "qwen-max-latest");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(300));
        assert!(!cfg.has_credential());
        assert!(!cfg.sse_event_names);
    }

    #[test]
    fn test_explicit_values() {
        let cfg = config_from(&[
            ("PORT", "9100"),
            ("OPENAI_API_URL", "http://localhost:11434/v1"),
            ("OPENAI_API_KEY", "sk-test"),
            ("BRIDGE_MODEL", "deepseek-reasoner"),
            ("BRIDGE_REQUEST_TIMEOUT_SECS", "30"),
            ("BRIDGE_SSE_EVENT_NAMES", "true"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.backend_url, "http://localhost:11434/v1");
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.model, "deepseek-reasoner");
        assert_eq!(cfg.request_timeout_secs, 30);
        assert!(cfg.sse_event_names);
    }

    #[test]
    fn test_empty_key_counts_as_missing() {
        let cfg = config_from(&[("OPENAI_API_KEY", "")]).unwrap();
        assert!(!cfg.has_credential());
    }

    #[test]
    fn test_garbage_numbers_fall_back_to_defaults() {
        let cfg = config_from(&[("PORT", "eighty"), ("BRIDGE_REQUEST_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_invalid_backend_url_is_rejected() {
        assert!(config_from(&[("OPENAI_API_URL", "not a url")]).is_err());
        assert!(config_from(&[("OPENAI_API_URL", "ftp://example.com")]).is_err());
    }
}
