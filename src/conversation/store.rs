//! Conversation store

use super::{Message, MessageId, Sender};
use serde::Serialize;

/// Ordered log of messages, append-ordered by creation.
///
/// Every mutation either applies completely or leaves the log untouched; the
/// boolean results report which.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Rejected if its id is already present.
    pub fn append(&mut self, message: Message) -> bool {
        if self.find(message.id).is_some() {
            tracing::warn!(message_id = %message.id, "Refusing to append duplicate message id");
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Append a content segment to a bot message, creating it on first use.
    ///
    /// Returns false (and changes nothing) if `id` belongs to a user message.
    pub fn append_segment(&mut self, id: MessageId, text: impl Into<String>) -> bool {
        match self.find_mut(id) {
            Some(message) if message.sender == Sender::Bot => {
                message.segments.push(text.into());
                true
            }
            Some(_) => {
                tracing::warn!(message_id = %id, "Refusing to append segment to user message");
                false
            }
            None => {
                self.messages.push(Message::bot(id, text));
                true
            }
        }
    }

    pub fn mark_errored(&mut self, id: MessageId) -> bool {
        self.set_errored(id, true)
    }

    pub fn clear_errored(&mut self, id: MessageId) -> bool {
        self.set_errored(id, false)
    }

    #[must_use]
    pub fn find(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Prompt text of a user message (its first segment)
    #[must_use]
    pub fn prompt_text(&self, id: MessageId) -> Option<&str> {
        self.find(id)
            .filter(|m| m.is_user())
            .and_then(|m| m.segments.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn find_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn set_errored(&mut self, id: MessageId, errored: bool) -> bool {
        match self.find_mut(id) {
            Some(message) => {
                message.errored = errored;
                true
            }
            None => false,
        }
    }
}
