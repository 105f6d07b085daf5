//! Recovers fixed-length frames from a chunked serial byte stream.
//!
//! The serial links deliver bytes in arbitrary chunks and nothing stops a
//! stray or dropped byte from shifting frame boundaries.  [`FrameAssembler`]
//! uses the start byte to resynchronize:
//!
//! ```text
//!  stray  | frame             | frame             |
//!  3f 06  | a5 02 00 00 02    | a5 00 00 00 00    |
//!  ^^^^^ dropped before buffering starts
//! ```
//!
//! Once at least one frame's worth of bytes is buffered, the candidate frame
//! is everything up to the next start byte.  A short candidate is reported
//! and skipped, a long one is truncated and the buffer dropped.
//!
//! The assembler is I/O free; the async reader in `desk-bridge` feeds it.

use thiserror::Error;

use crate::protocol::frame::{checksum, Frame, FRAME_LEN};

/// Conditions the assembler reports instead of a frame.
///
/// Both are expected on a noisy line; callers log them and keep reading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Another start byte arrived before a full frame; carries the partial
    /// bytes.
    #[error("short frame: {} bytes before next start byte", .0.len())]
    Short(Vec<u8>),

    /// More than a frame's worth of bytes arrived before the next start byte
    /// and the truncated frame failed its checksum; carries every byte that
    /// was dropped.
    #[error("long frame: {} bytes between start bytes, checksum failed", .0.len())]
    Long(Vec<u8>),
}

/// Buffers serial chunks and splits them into frames.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    start: u8,
    buf: Vec<u8>,
}

impl FrameAssembler {
    /// Creates an assembler for frames that begin with `start`.
    pub fn new(start: u8) -> Self {
        Self {
            start,
            buf: Vec::with_capacity(FRAME_LEN * 4),
        }
    }

    /// Number of bytes waiting to be framed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Appends a chunk read from the line.
    ///
    /// While the buffer is empty, bytes before the first start byte are
    /// discarded.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.buf.is_empty() {
            match chunk.iter().position(|b| *b == self.start) {
                Some(i) => self.buf.extend_from_slice(&chunk[i..]),
                None => {
                    if !chunk.is_empty() {
                        tracing::trace!(dropped = chunk.len(), "discarding bytes before start byte");
                    }
                }
            }
        } else {
            self.buf.extend_from_slice(chunk);
        }
    }

    /// Takes the next frame out of the buffer.
    ///
    /// Returns `None` until at least [`FRAME_LEN`] bytes are buffered.
    pub fn next_frame(&mut self) -> Option<Result<Frame, FramingError>> {
        if self.buf.len() < FRAME_LEN {
            return None;
        }

        let end = self.buf[1..]
            .iter()
            .position(|b| *b == self.start)
            .map_or(self.buf.len(), |i| i + 1);

        if end < FRAME_LEN {
            let partial: Vec<u8> = self.buf.drain(..end).collect();
            return Some(Err(FramingError::Short(partial)));
        }

        if end == FRAME_LEN {
            let frame = Frame::from_slice(&self.buf[..FRAME_LEN]);
            self.buf.drain(..FRAME_LEN);
            return frame.map(Ok);
        }

        // Long candidate: the leading bytes survive only if their sum,
        // start byte included, matches the last byte.
        let dropped = std::mem::take(&mut self.buf);
        let head = &dropped[..FRAME_LEN];
        if checksum(&head[..FRAME_LEN - 1]) == head[FRAME_LEN - 1] {
            tracing::debug!(dropped = end - FRAME_LEN, "truncated long frame");
            return Frame::from_slice(head).map(Ok);
        }
        let mut candidate = dropped;
        candidate.truncate(end);
        Some(Err(FramingError::Long(candidate)))
    }

    /// Empties the buffer, returning whatever was in it.
    ///
    /// Used when the underlying read fails mid-frame.
    pub fn take_partial(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
