//! Pure state transition function

use super::event::StreamFailure;
use super::state::{ChatState, Exchange, ExchangeError, ExchangeId};
use super::{Effect, Event};
use crate::conversation::{Conversation, MessageId};
use crate::stream::{ControlSignal, Frame};
use thiserror::Error;

/// Notification text for transport failures
pub const CONNECTIVITY_NOTICE: &str = "Unable to reach the chat server. Please try again shortly.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    #[must_use]
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is still in progress (stop it first)")]
    Busy,
    #[error("Cannot send an empty message")]
    EmptyPrompt,
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),
    #[error("Only user messages can be resent: {0}")]
    NotAUserMessage(MessageId),
    #[error("Event for exchange {0} which is no longer active")]
    StaleExchange(ExchangeId),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Whether the rejection answers a user command (as opposed to an internal stream event)
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TransitionError::Busy
                | TransitionError::EmptyPrompt
                | TransitionError::MessageNotFound(_)
                | TransitionError::NotAUserMessage(_)
        )
    }
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs; the conversation
/// is read but never mutated here.
///
/// # Errors
///
/// Returns a [`TransitionError`] when the event does not apply: a command
/// the current state refuses, or a stream event for an exchange that is no
/// longer in flight. The state is unchanged in either case.
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &ChatState,
    conversation: &Conversation,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    // Stream events only ever apply to the exchange in flight
    if let Some(exchange_id) = event.exchange_id() {
        if state.exchange().map(|e| e.id) != Some(exchange_id) {
            return Err(TransitionError::StaleExchange(exchange_id));
        }
    }

    match (state, event) {
        // ============================================================
        // User input
        // ============================================================
        (_, Event::InputChanged { text }) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::SetInput { text }))
        }

        (
            ChatState::Idle,
            Event::UserSend {
                text,
                message_id,
                exchange_id,
                reply_id,
            },
        ) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyPrompt);
            }
            let exchange = Exchange {
                id: exchange_id,
                origin: message_id,
                reply: reply_id,
                prompt: text.clone(),
            };
            Ok(TransitionResult::new(ChatState::Sending {
                exchange: exchange.clone(),
            })
            .with_effect(Effect::AppendUserMessage { message_id, text })
            .with_effect(Effect::clear_input())
            .with_effect(Effect::OpenStream { exchange }))
        }

        (
            ChatState::Idle,
            Event::UserResend {
                message_id,
                exchange_id,
                reply_id,
            },
        ) => {
            let message = conversation
                .find(message_id)
                .ok_or(TransitionError::MessageNotFound(message_id))?;
            let prompt = conversation
                .prompt_text(message.id)
                .ok_or(TransitionError::NotAUserMessage(message_id))?;
            let exchange = Exchange {
                id: exchange_id,
                origin: message_id,
                reply: reply_id,
                prompt: prompt.to_string(),
            };
            Ok(TransitionResult::new(ChatState::Sending {
                exchange: exchange.clone(),
            })
            .with_effect(Effect::ClearErrored { message_id })
            .with_effect(Effect::OpenStream { exchange }))
        }

        // Single flight: nothing new while an exchange is active
        (
            ChatState::Sending { .. } | ChatState::Streaming { .. },
            Event::UserSend { .. } | Event::UserResend { .. },
        ) => Err(TransitionError::Busy),

        (ChatState::Idle, Event::UserStop) => Ok(TransitionResult::new(ChatState::Idle)),

        (ChatState::Sending { exchange } | ChatState::Streaming { exchange }, Event::UserStop) => {
            Ok(TransitionResult::new(ChatState::Idle).with_effects([
                Effect::CancelStream,
                Effect::finish(exchange.id, Err(ExchangeError::UserCancelled)),
            ]))
        }

        // ============================================================
        // Stream lifecycle
        // ============================================================
        (ChatState::Sending { exchange }, Event::StreamOpened { .. }) => {
            Ok(TransitionResult::new(ChatState::Streaming {
                exchange: exchange.clone(),
            }))
        }

        (ChatState::Streaming { exchange }, Event::FrameReceived { frame, .. }) => {
            Ok(apply_frame(exchange, frame))
        }

        (ChatState::Streaming { exchange }, Event::StreamEnded { .. }) => {
            Ok(TransitionResult::new(ChatState::Idle)
                .with_effect(Effect::finish(exchange.id, Ok(()))))
        }

        (
            ChatState::Sending { exchange },
            Event::StreamFailed {
                failure: StreamFailure::ConfigMissing,
                ..
            },
        ) => Ok(TransitionResult::new(ChatState::Idle)
            .with_effect(Effect::finish(exchange.id, Err(ExchangeError::ConfigMissing)))),

        (
            ChatState::Sending { exchange } | ChatState::Streaming { exchange },
            Event::StreamFailed {
                failure: StreamFailure::Transport { message },
                ..
            },
        ) => Ok(TransitionResult::new(ChatState::Idle).with_effects([
            Effect::MarkErrored {
                message_id: exchange.origin,
            },
            Effect::notify_error(CONNECTIVITY_NOTICE),
            Effect::finish(exchange.id, Err(ExchangeError::TransportFailure(message))),
        ])),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in state {}",
            state.phase()
        ))),
    }
}

fn apply_frame(exchange: &Exchange, frame: Frame) -> TransitionResult {
    match frame {
        Frame::Text { content } => TransitionResult::new(ChatState::Streaming {
            exchange: exchange.clone(),
        })
        .with_effect(Effect::AppendSegment {
            message_id: exchange.reply,
            text: content,
        }),

        Frame::Control(ControlSignal::Error { message }) => {
            TransitionResult::new(ChatState::Idle).with_effects([
                Effect::CancelStream,
                Effect::MarkErrored {
                    message_id: exchange.origin,
                },
                Effect::notify_error(message.clone()),
                Effect::finish(exchange.id, Err(ExchangeError::ControlError(message))),
            ])
        }

        Frame::Terminal => TransitionResult::new(ChatState::Idle).with_effects([
            Effect::CancelStream,
            Effect::finish(exchange.id, Ok(())),
        ]),
    }
}
