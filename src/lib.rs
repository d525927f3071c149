//! Streaming chat client engine
//!
//! Sends a prompt to a text-generation service, decodes the reply as a stream
//! of `data: ` frames, and applies each frame to an in-memory conversation
//! while honoring user cancellation.

pub mod client;
pub mod config;
pub mod conversation;
pub mod runtime;
pub mod state_machine;
pub mod stream;

pub use client::{ChatClient, HttpChatClient, LoggingClient};
pub use config::ClientConfig;
pub use runtime::{start, ChatError, ChatHandle, ChatSnapshot, ChatUpdate};
