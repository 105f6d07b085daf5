//! Arbitration of the single serial line to the controller.
//!
//! Three writers share the controller bus: the handset pump relaying key
//! frames, remote commands, and the keep-alive task.  They take the same
//! mutex in one of two ways:
//!
//! | Writer        | Acquisition     | When the bus is busy        |
//! |---------------|-----------------|-----------------------------|
//! | handset relay | `try_lock`      | frame dropped, never queued |
//! | command burst | `lock().await`  | waits its turn              |
//! | keep-alive    | `lock().await`  | waits its turn              |
//!
//! The handset repeats key frames every few milliseconds, so losing one
//! repeat while a burst is on the wire is harmless, whereas a command must
//! never be lost.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use desk_core::Frame;

use crate::application::ports::{ByteSink, InputLine, OutputLine};

/// Shape of a burst the bridge writes on its own behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstTiming {
    /// Copies of the frame to write.
    pub count: u32,
    /// Pause after each write.
    pub spacing: Duration,
    /// Pause between raising the activity line and the first write.
    pub settle: Duration,
}

impl Default for BurstTiming {
    /// Five writes, 10 ms apart, after a 1 ms settle.
    fn default() -> Self {
        Self {
            count: 5,
            spacing: Duration::from_millis(10),
            settle: Duration::from_millis(1),
        }
    }
}

/// Outcome of a relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    Written,
    /// A burst held the bus; the frame was discarded.
    Dropped,
}

/// Outcome of a burst that yields to the manual override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded {
    Sent,
    /// The override input was high once the bus was ours; nothing written.
    Overridden,
}

/// The controller line plus the activity output that brackets bridge writes.
pub struct ControllerBus {
    sink: Mutex<Box<dyn ByteSink>>,
    activity: Arc<dyn OutputLine>,
    timing: BurstTiming,
}

impl ControllerBus {
    pub fn new(sink: Box<dyn ByteSink>, activity: Arc<dyn OutputLine>, timing: BurstTiming) -> Self {
        Self {
            sink: Mutex::new(sink),
            activity,
            timing,
        }
    }

    pub fn timing(&self) -> BurstTiming {
        self.timing
    }

    /// Relays a handset frame if the bus is free.
    ///
    /// # Errors
    ///
    /// Returns the write error from the controller line.
    pub fn try_forward(&self, frame: &Frame) -> io::Result<Forwarded> {
        let Ok(mut sink) = self.sink.try_lock() else {
            debug!(%frame, "bus busy, dropping handset frame");
            return Ok(Forwarded::Dropped);
        };
        sink.write_frame(frame)?;
        trace!(%frame, "relayed to controller");
        Ok(Forwarded::Written)
    }

    /// Writes `frame` as a burst, waiting for the bus if necessary.
    ///
    /// The activity line is high for the whole burst and is driven low again
    /// even when a write fails.
    ///
    /// # Errors
    ///
    /// Returns the first write or GPIO error.
    pub async fn send_burst(&self, frame: &Frame) -> io::Result<()> {
        let mut sink = self.sink.lock().await;
        self.burst_locked(&mut **sink, frame).await
    }

    /// Like [`send_burst`](Self::send_burst), but reads `manual_override`
    /// after the bus is acquired and writes nothing while it is high.
    ///
    /// A command queued behind a keep-alive or another command therefore
    /// still yields to someone who grabbed the handset in the meantime.
    ///
    /// # Errors
    ///
    /// Returns the override read error, or the first write or GPIO error.
    pub async fn send_burst_unless(
        &self,
        frame: &Frame,
        manual_override: &dyn InputLine,
    ) -> io::Result<Guarded> {
        let mut sink = self.sink.lock().await;
        if manual_override.is_high()? {
            debug!(%frame, "burst withheld: manual override");
            return Ok(Guarded::Overridden);
        }
        self.burst_locked(&mut **sink, frame).await?;
        Ok(Guarded::Sent)
    }

    /// Writes the burst on an already-held sink, bracketed by the activity line.
    async fn burst_locked(&self, sink: &mut dyn ByteSink, frame: &Frame) -> io::Result<()> {
        self.activity.set(true)?;

        let written = self.write_burst(sink, frame).await;
        let lowered = self.activity.set(false);

        if let Err(e) = &lowered {
            warn!("failed to lower activity line: {e}");
        }
        debug!(%frame, count = self.timing.count, "burst written");
        written.and(lowered)
    }

    async fn write_burst(&self, sink: &mut dyn ByteSink, frame: &Frame) -> io::Result<()> {
        tokio::time::sleep(self.timing.settle).await;
        for _ in 0..self.timing.count {
            sink.write_frame(frame)?;
            tokio::time::sleep(self.timing.spacing).await;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
