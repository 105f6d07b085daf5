//! Async frame reader over a polled serial line.
//!
//! Wraps a [`ByteSource`] and a [`FrameAssembler`]: reads whatever the line
//! has in chunks of up to [`CHUNK_LEN`] bytes, sleeps for the poll interval
//! when the line is idle, and yields one frame (or framing error) per call.

use std::io;
use std::time::Duration;

use thiserror::Error;

use desk_core::{Frame, FrameAssembler, FramingError};

use crate::application::ports::ByteSource;
use crate::application::shutdown::ShutdownSignal;

/// Largest single read from the line.
pub const CHUNK_LEN: usize = 16;

/// Why [`FrameReader::next_frame`] did not return a frame.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("read cancelled by shutdown")]
    Cancelled,

    /// The line failed; `partial` holds the bytes buffered before the failure.
    #[error("serial read failed with {} bytes buffered: {source}", partial.len())]
    Io {
        partial: Vec<u8>,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Framing(#[from] FramingError),
}

pub struct FrameReader<S> {
    source: S,
    assembler: FrameAssembler,
    poll_interval: Duration,
}

impl<S: ByteSource> FrameReader<S> {
    /// Creates a reader for frames starting with `start`.
    pub fn new(source: S, start: u8, poll_interval: Duration) -> Self {
        Self {
            source,
            assembler: FrameAssembler::new(start),
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Waits for the next frame.
    ///
    /// Shutdown is checked before every poll and interrupts the idle sleep.
    ///
    /// # Errors
    ///
    /// - [`ReadError::Cancelled`] once `shutdown` has been triggered.
    /// - [`ReadError::Framing`] for a short or corrupt long frame; the next
    ///   call continues with the following bytes.
    /// - [`ReadError::Io`] when the line fails; the buffer is emptied.
    pub async fn next_frame(&mut self, shutdown: &mut ShutdownSignal) -> Result<Frame, ReadError> {
        let mut chunk = [0u8; CHUNK_LEN];
        loop {
            if let Some(result) = self.assembler.next_frame() {
                return result.map_err(ReadError::from);
            }
            if shutdown.is_triggered() {
                return Err(ReadError::Cancelled);
            }

            let ready = match self.source.available() {
                Ok(n) => n,
                Err(source) => return Err(self.io_error(source)),
            };
            if ready == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => return Err(ReadError::Cancelled),
                    _ = tokio::time::sleep(self.poll_interval) => continue,
                }
            }

            let want = ready.min(CHUNK_LEN);
            match self.source.read(&mut chunk[..want]) {
                Ok(n) => self.assembler.push(&chunk[..n]),
                Err(source) => return Err(self.io_error(source)),
            }
        }
    }

    fn io_error(&mut self, source: io::Error) -> ReadError {
        ReadError::Io {
            partial: self.assembler.take_partial(),
            source,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
