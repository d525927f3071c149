//! Process configuration for the chat client

use std::time::Duration;

/// Default connect timeout for the HTTP client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the controller's event queue
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Path appended to the base URL for chat requests
const CHAT_PATH: &str = "/chat";

/// Configuration for the chat client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the text-generation service (e.g. `http://localhost:8000`)
    pub base_url: Option<String>,
    pub connect_timeout: Duration,
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by `from_env` and tests)
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let connect_timeout = lookup("CHAT_CONNECT_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs);

        let event_buffer = lookup("CHAT_EVENT_BUFFER")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_EVENT_BUFFER);

        Self {
            base_url: lookup("CHAT_API_URL"),
            connect_timeout,
            event_buffer,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Full chat endpoint, or `None` when no usable base URL is configured.
    ///
    /// A blank base URL counts as missing.
    #[must_use]
    pub fn chat_endpoint(&self) -> Option<String> {
        let base = self.base_url.as_deref()?.trim();
        if base.is_empty() {
            return None;
        }
        Some(format!("{}{CHAT_PATH}", base.trim_end_matches('/')))
    }
}
