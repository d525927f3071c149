//! Frame classification
//!
//! Plain text is never JSON-encoded by the service, so a payload that fails to
//! decode as a control signal is content, not an error.

use serde::{Deserialize, Serialize};

/// Payload marking the intended end of a reply
pub const TERMINAL_SENTINEL: &str = "[DONE]";

/// Out-of-band signals the service can send in place of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlSignal {
    /// The service failed to produce (the rest of) a reply
    Error { message: String },
}

impl ControlSignal {
    /// Control kind as it appears on the wire
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ControlSignal::Error { .. } => "error",
        }
    }

    /// Human-readable detail carried by the signal
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            ControlSignal::Error { message } => message,
        }
    }
}

/// A classified frame payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Literal reply text, one segment
    Text { content: String },
    /// Structured out-of-band signal
    Control(ControlSignal),
    /// End of reply
    Terminal,
}

impl Frame {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Frame::Text {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Frame::Control(ControlSignal::Error {
            message: message.into(),
        })
    }

    /// Whether no further frames of the exchange should be consumed after this one
    #[must_use]
    pub fn ends_exchange(&self) -> bool {
        matches!(
            self,
            Frame::Terminal | Frame::Control(ControlSignal::Error { .. })
        )
    }
}

/// Classify a decoded frame payload
#[must_use]
pub fn classify(payload: &str) -> Frame {
    if payload.trim() == TERMINAL_SENTINEL {
        return Frame::Terminal;
    }

    match serde_json::from_str::<ControlSignal>(payload) {
        Ok(signal) => Frame::Control(signal),
        Err(_) => Frame::Text {
            content: payload.to_string(),
        },
    }
}
