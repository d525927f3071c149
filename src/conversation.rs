//! Conversation log
//!
//! An ordered, append-mostly list of user and bot messages. Mutations are
//! driven by the request lifecycle controller; everything else only reads.

mod message;
mod store;

pub use message::{IdAllocator, Message, MessageId, Sender};
pub use store::Conversation;
