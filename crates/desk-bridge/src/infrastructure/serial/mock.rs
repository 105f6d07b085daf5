//! In-memory serial lines for tests.
//!
//! [`ScriptedSource`] replays a queue of byte chunks and errors, one chunk
//! per `read`; [`RecordingSink`] keeps every frame written together with the
//! (tokio) time of the write.  Both are `Clone` and share their state, so a
//! test can hand one copy to the code under test and keep the other.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;

use desk_core::Frame;

use crate::application::ports::{ByteSink, ByteSource};

enum Step {
    Bytes(Vec<u8>),
    Fail(io::ErrorKind),
}

/// A byte source fed by the test.
///
/// An empty queue reads as an idle line.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    steps: Arc<Mutex<VecDeque<Step>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `bytes` to arrive as one chunk.
    pub fn push_bytes(&self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.steps().push_back(Step::Bytes(bytes.to_vec()));
        }
    }

    /// Queues a read failure of `kind`.
    pub fn push_error(&self, kind: io::ErrorKind) {
        self.steps().push_back(Step::Fail(kind));
    }

    /// Number of queued steps not yet consumed.
    pub fn pending(&self) -> usize {
        self.steps().len()
    }

    fn steps(&self) -> MutexGuard<'_, VecDeque<Step>> {
        self.steps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ByteSource for ScriptedSource {
    fn available(&mut self) -> io::Result<usize> {
        Ok(match self.steps().front() {
            Some(Step::Bytes(bytes)) => bytes.len(),
            // Reported as readable so the failure surfaces from `read`.
            Some(Step::Fail(_)) => 1,
            None => 0,
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut steps = self.steps();
        match steps.pop_front() {
            None => Ok(0),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            Some(Step::Bytes(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    steps.push_front(Step::Bytes(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

/// A byte sink that records frames instead of transmitting them.
#[derive(Clone, Default)]
pub struct RecordingSink {
    writes: Arc<Mutex<Vec<(Instant, Frame)>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails with `BrokenPipe`.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Frames written so far, oldest first.
    pub fn frames(&self) -> Vec<Frame> {
        self.writes_at().into_iter().map(|(_, frame)| frame).collect()
    }

    /// Frames written so far with the time of each write.
    pub fn writes_at(&self) -> Vec<(Instant, Frame)> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ByteSink for RecordingSink {
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "line disconnected"));
        }
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((Instant::now(), *frame));
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
