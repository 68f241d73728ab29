//! Line splitting for the inbound byte stream.
//!
//! The controller terminates lines with `\n`, usually preceded by `\r`.
//! The decoder buffers partial reads and hands out one line at a time.

use bytes::{Buf, Bytes, BytesMut};

/// Maximum accepted line length. Longer runs without a terminator are noise.
pub const MAX_LINE_LEN: usize = 256;

/// Line decoder that handles partial data.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    /// Creates a new line decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the next complete, non-empty line without its terminator.
    ///
    /// Returns `None` when more data is needed.
    pub fn decode(&mut self) -> Option<Bytes> {
        loop {
            let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > MAX_LINE_LEN {
                    tracing::warn!(
                        "discarding {} bytes without line terminator",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                }
                return None;
            };

            let mut line = self.buffer.split_to(end);
            self.buffer.advance(1);

            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if !line.is_empty() {
                return Some(line.freeze());
            }
        }
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
