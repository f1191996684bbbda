//! Client configuration.
//!
//! Read once from environment variables:
//! - `LIFEOS_API_URL`: REST base URL (default: "http://localhost:3011")
//! - `LIFEOS_SOCKET_URL`: push-channel websocket URL (default: the API URL
//!   with a `ws` scheme and a `/ws` path)
//! - `LIFEOS_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
//! - `LIFEOS_HANDSHAKE_TIMEOUT_SECS`: push connect + auth timeout (default: 10)

use std::time::Duration;

use crate::error::SyncError;

pub const DEFAULT_API_URL: &str = "http://localhost:3011";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_url: String,
    pub socket_url: String,
    pub request_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig::for_api(DEFAULT_API_URL)
    }
}

impl SyncConfig {
    /// Configuration for a given API base URL with default timeouts.
    pub fn for_api(api_url: &str) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        SyncConfig {
            socket_url: socket_url_for(&api_url),
            api_url,
            request_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let api_url = lookup("LIFEOS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = SyncConfig::for_api(&api_url);

        if let Some(socket_url) = lookup("LIFEOS_SOCKET_URL") {
            config.socket_url = socket_url;
        }
        if let Some(raw) = lookup("LIFEOS_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("LIFEOS_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("LIFEOS_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout = parse_secs("LIFEOS_HANDSHAKE_TIMEOUT_SECS", &raw)?;
        }
        Ok(config)
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, SyncError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|err| SyncError::Config(format!("{key}='{raw}': {err}")))
}

/// `http://host:port` -> `ws://host:port/ws`, `https` -> `wss`.
fn socket_url_for(api_url: &str) -> String {
    let rest = if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    };
    format!("{rest}/ws")
}
