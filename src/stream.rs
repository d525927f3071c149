//! Incremental decoding of the chat reply stream
//!
//! The service replies with UTF-8 text events separated by a blank line, each
//! carrying its payload after a `data: ` prefix. The decoder reassembles events
//! across arbitrary read boundaries; the classifier turns each payload into a
//! [`Frame`].

mod classifier;
mod decoder;

#[cfg(test)]
mod proptests;

pub use classifier::{classify, ControlSignal, Frame, TERMINAL_SENTINEL};
pub use decoder::{FrameDecoder, DATA_PREFIX, FRAME_DELIMITER};
