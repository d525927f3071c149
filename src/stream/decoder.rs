//! Frame decoder
//!
//! Keeps a residual buffer across reads. Only text up to the last complete
//! delimiter is ever split into frames; the remainder waits for more input.

/// Separator between events on the wire
pub const FRAME_DELIMITER: &str = "\n\n";

/// Prefix marking an event payload as content
pub const DATA_PREFIX: &str = "data: ";

/// Stateful splitter turning a chunked byte stream into frame payloads
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Text received after the last complete delimiter
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence that has not fully arrived yet
    pending_bytes: Vec<u8>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text and return the payloads of every frame it completed.
    ///
    /// Frames without the `data: ` prefix are framing noise and are dropped.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        if !self.buffer.contains(FRAME_DELIMITER) {
            return Vec::new();
        }

        let buffered = std::mem::take(&mut self.buffer);
        let mut pieces: Vec<&str> = buffered.split(FRAME_DELIMITER).collect();
        // The last piece has no terminating delimiter yet
        self.buffer = pieces.pop().unwrap_or_default().to_string();

        pieces
            .into_iter()
            .filter_map(|raw| {
                let payload = raw.strip_prefix(DATA_PREFIX);
                if payload.is_none() && !raw.is_empty() {
                    tracing::trace!(len = raw.len(), "Dropping frame without data prefix");
                }
                payload
            })
            .map(str::to_string)
            .collect()
    }

    /// Like [`feed`](Self::feed), but for raw bytes off the wire.
    ///
    /// A multi-byte character split across reads is held back until it
    /// completes. Invalid sequences decode to U+FFFD.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(chunk);
        let text = self.take_decoded_text();
        if text.is_empty() {
            return Vec::new();
        }
        self.feed(&text)
    }

    /// True when no partial frame or partial character is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.pending_bytes.is_empty()
    }

    fn take_decoded_text(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending_bytes);
        let mut rest = pending.as_slice();
        let mut text = String::with_capacity(rest.len());

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(invalid_len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = after.get(invalid_len..).unwrap_or_default();
                        }
                        None => {
                            // Incomplete sequence at the end: wait for the next read
                            self.pending_bytes = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        text
    }
}
