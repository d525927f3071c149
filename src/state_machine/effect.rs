//! Effects produced by state transitions

use super::state::{Exchange, ExchangeId, ExchangeOutcome};
use crate::conversation::MessageId;
use serde::{Deserialize, Serialize};

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a new user message to the conversation
    AppendUserMessage { message_id: MessageId, text: String },

    /// Replace the input buffer contents
    SetInput { text: String },

    /// Append a text segment to the reply, creating the bot message if needed
    AppendSegment { message_id: MessageId, text: String },

    MarkErrored { message_id: MessageId },

    ClearErrored { message_id: MessageId },

    /// Open the reply stream for the exchange (spawns a background reader)
    OpenStream { exchange: Exchange },

    /// Invalidate the live cancellation token
    CancelStream,

    /// Surface a message on the notification channel
    Notify { level: NotifyLevel, message: String },

    /// Report the end of an exchange to observers
    FinishExchange {
        exchange_id: ExchangeId,
        outcome: ExchangeOutcome,
    },
}

impl Effect {
    #[must_use]
    pub fn clear_input() -> Self {
        Effect::SetInput {
            text: String::new(),
        }
    }

    #[must_use]
    pub fn notify_error(message: impl Into<String>) -> Self {
        Effect::Notify {
            level: NotifyLevel::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn finish(exchange_id: ExchangeId, outcome: ExchangeOutcome) -> Self {
        Effect::FinishExchange {
            exchange_id,
            outcome,
        }
    }
}
