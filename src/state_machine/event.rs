//! Events that can occur during a chat exchange

use super::state::ExchangeId;
use crate::conversation::MessageId;
use crate::stream::Frame;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// Send a new prompt. Ids are minted by the caller so the transition stays pure.
    UserSend {
        text: String,
        message_id: MessageId,
        exchange_id: ExchangeId,
        reply_id: MessageId,
    },
    /// Re-issue the prompt of an existing user message
    UserResend {
        message_id: MessageId,
        exchange_id: ExchangeId,
        reply_id: MessageId,
    },
    UserStop,
    /// Draft text in the input buffer changed
    InputChanged { text: String },

    // Stream events
    StreamOpened { exchange_id: ExchangeId },
    FrameReceived { exchange_id: ExchangeId, frame: Frame },
    /// Reply body ended without a terminal frame
    StreamEnded { exchange_id: ExchangeId },
    StreamFailed {
        exchange_id: ExchangeId,
        failure: StreamFailure,
    },
}

impl Event {
    /// Exchange a stream event belongs to; `None` for user events
    #[must_use]
    pub fn exchange_id(&self) -> Option<ExchangeId> {
        match self {
            Event::StreamOpened { exchange_id }
            | Event::FrameReceived { exchange_id, .. }
            | Event::StreamEnded { exchange_id }
            | Event::StreamFailed { exchange_id, .. } => Some(*exchange_id),
            Event::UserSend { .. }
            | Event::UserResend { .. }
            | Event::UserStop
            | Event::InputChanged { .. } => None,
        }
    }
}

/// Why a stream could not be opened or read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFailure {
    /// No base URL configured; no request was attempted
    ConfigMissing,
    /// Open or read failed
    Transport { message: String },
}
