//! Response body sinks
//!
//! The HTTP client streams body chunks into a [`BodySink`]. [`Download`]
//! copies the image stream into a fixed buffer; [`Discard`] drops the body of
//! control responses.

use crate::palette::BLANK;

/// Receiver for a streamed response body
pub trait BodySink {
    /// Called once after the headers are parsed
    fn begin(&mut self, content_length: Option<usize>);

    /// Consume a chunk of body data. Returns `false` once no more data is wanted.
    fn write(&mut self, chunk: &[u8]) -> bool;
}

/// Sink that throws the body away
pub struct Discard;

impl BodySink for Discard {
    fn begin(&mut self, _content_length: Option<usize>) {}

    fn write(&mut self, _chunk: &[u8]) -> bool {
        true
    }
}

/// Result of a finished download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Bytes copied into the buffer
    pub received: usize,
    /// Bytes the download aimed for: `min(buffer, Content-Length)`
    pub expected: usize,
    /// Bytes filled with [`BLANK`] after the received data
    pub padded: usize,
}

impl DownloadSummary {
    /// Whether fewer bytes arrived than were expected
    pub fn is_short(&self) -> bool {
        self.received < self.expected
    }
}

/// Fixed-buffer download of a packed image stream
///
/// Reads at most `min(buffer.len(), Content-Length)` bytes; anything beyond
/// is ignored. [`Download::finish`] pads the rest of the buffer.
pub struct Download<'a> {
    buffer: &'a mut [u8],
    expected: usize,
    written: usize,
}

impl<'a> Download<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let expected = buffer.len();
        Self {
            buffer,
            expected,
            written: 0,
        }
    }

    /// Whether the expected byte count has been reached
    pub fn is_full(&self) -> bool {
        self.written >= self.expected
    }

    /// Pad everything after the received bytes and release the buffer
    pub fn finish(self) -> DownloadSummary {
        let padded = self.buffer.len() - self.written;
        self.buffer[self.written..].fill(BLANK);
        DownloadSummary {
            received: self.written,
            expected: self.expected,
            padded,
        }
    }
}

impl BodySink for Download<'_> {
    fn begin(&mut self, content_length: Option<usize>) {
        self.expected = match content_length {
            Some(len) => len.min(self.buffer.len()),
            None => self.buffer.len(),
        };
    }

    fn write(&mut self, chunk: &[u8]) -> bool {
        let room = self.expected.saturating_sub(self.written);
        let to_copy = chunk.len().min(room);
        self.buffer[self.written..self.written + to_copy].copy_from_slice(&chunk[..to_copy]);
        self.written += to_copy;
        !self.is_full()
    }
}
