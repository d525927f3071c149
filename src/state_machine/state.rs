//! Request lifecycle state types

use crate::conversation::MessageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of one request/reply exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(u64);

impl ExchangeId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The in-flight exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: ExchangeId,
    /// User message the reply answers; carries the error flag
    pub origin: MessageId,
    /// Id the bot message gets once the first text frame arrives
    pub reply: MessageId,
    pub prompt: String,
}

/// Controller state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatState {
    /// Ready to send
    #[default]
    Idle,

    /// Request issued, waiting for the reply stream to open
    Sending { exchange: Exchange },

    /// Reply stream open, frames being applied
    Streaming { exchange: Exchange },
}

impl ChatState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, ChatState::Idle)
    }

    /// The exchange in flight, if any
    #[must_use]
    pub fn exchange(&self) -> Option<&Exchange> {
        match self {
            ChatState::Idle => None,
            ChatState::Sending { exchange } | ChatState::Streaming { exchange } => Some(exchange),
        }
    }

    #[must_use]
    pub fn phase(&self) -> ChatPhase {
        match self {
            ChatState::Idle => ChatPhase::Idle,
            ChatState::Sending { .. } => ChatPhase::Sending,
            ChatState::Streaming { .. } => ChatPhase::Streaming,
        }
    }
}

/// Data-free view of [`ChatState`] for observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
}

impl fmt::Display for ChatPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChatPhase::Idle => "idle",
            ChatPhase::Sending => "sending",
            ChatPhase::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Why an exchange ended without completing normally
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum ExchangeError {
    #[error("Chat service URL is not configured")]
    ConfigMissing,
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    #[error("Service reported an error: {0}")]
    ControlError(String),
    #[error("Cancelled by user")]
    UserCancelled,
}

impl ExchangeError {
    /// Whether the originating user message gets flagged as errored
    #[must_use]
    pub fn marks_errored(&self) -> bool {
        matches!(
            self,
            ExchangeError::TransportFailure(_) | ExchangeError::ControlError(_)
        )
    }
}

/// How an exchange ended
pub type ExchangeOutcome = Result<(), ExchangeError>;
