//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration against a local development backend.

use std::time::Duration;

use murmur_shared::constants::{
    DEFAULT_API_URL, DEFAULT_SOCKET_URL, EVENT_BUFFER, REQUEST_TIMEOUT_SECS, SEEN_FLUSH_DELAY_MS,
    TYPING_STOP_DELAY_MS,
};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    /// Env: `MURMUR_API_URL`
    /// Default: `http://localhost:3000/api`
    pub api_url: String,

    /// Realtime WebSocket endpoint.
    /// Env: `MURMUR_SOCKET_URL`
    /// Default: `ws://localhost:3000/ws`
    pub socket_url: String,

    /// Quiet period after the last keystroke before stop-typing is sent.
    /// Env: `MURMUR_TYPING_STOP_MS`
    /// Default: 2000 ms
    pub typing_stop_delay: Duration,

    /// Window that coalesces seen acknowledgements into one signal.
    /// Env: `MURMUR_SEEN_FLUSH_MS`
    /// Default: 300 ms
    pub seen_flush_delay: Duration,

    /// Per-request HTTP timeout.
    /// Env: `MURMUR_REQUEST_TIMEOUT_SECS`
    /// Default: 15 s
    pub request_timeout: Duration,

    /// Capacity of the store event broadcast and realtime channels.
    /// Env: `MURMUR_EVENT_BUFFER`
    /// Default: 256
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            typing_stop_delay: Duration::from_millis(TYPING_STOP_DELAY_MS),
            seen_flush_delay: Duration::from_millis(SEEN_FLUSH_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            event_buffer: EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("MURMUR_API_URL").filter(|v| !v.is_empty()) {
            config.api_url = url;
        }

        if let Some(url) = lookup("MURMUR_SOCKET_URL").filter(|v| !v.is_empty()) {
            config.socket_url = url;
        }

        if let Some(ms) = parse_number::<u64>(&lookup, "MURMUR_TYPING_STOP_MS") {
            config.typing_stop_delay = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_number::<u64>(&lookup, "MURMUR_SEEN_FLUSH_MS") {
            config.seen_flush_delay = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_number::<u64>(&lookup, "MURMUR_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(n) = parse_number::<usize>(&lookup, "MURMUR_EVENT_BUFFER") {
            config.event_buffer = n.max(1);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid numeric setting, using default");
            None
        }
    }
}
