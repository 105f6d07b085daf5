//! The two relay loops between handset and controller.
//!
//! Each pump owns the frame reader for one line and runs until shutdown.
//! Nothing that happens on the wire stops a pump: framing errors, bad
//! checksums and I/O failures are logged and the next read begins.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use desk_core::{classify, ButtonState, DisplayReading, Frame, FrameKind};

use crate::application::bus::ControllerBus;
use crate::application::keepalive::ActivityNotifier;
use crate::application::ports::{ByteSink, ByteSource, FaultSink, Watchdog};
use crate::application::position::PositionCache;
use crate::application::reader::{FrameReader, ReadError};
use crate::application::shutdown::ShutdownSignal;

/// Waits for one frame, handling everything that is not a frame.
///
/// Returns `None` on shutdown.
async fn next_frame<S: ByteSource>(
    reader: &mut FrameReader<S>,
    shutdown: &mut ShutdownSignal,
    watchdog: &dyn Watchdog,
    line: &'static str,
) -> Option<Frame> {
    loop {
        match reader.next_frame(shutdown).await {
            Ok(frame) => {
                watchdog.feed();
                return Some(frame);
            }
            Err(ReadError::Cancelled) => return None,
            Err(ReadError::Framing(e)) => warn!(line, "{e}"),
            Err(e @ ReadError::Io { .. }) => {
                warn!(line, "{e}");
                tokio::time::sleep(reader.poll_interval()).await;
            }
        }
    }
}

// ── Handset → controller ──────────────────────────────────────────────────────

/// Relays key frames from the handset to the controller.
pub struct HandsetPump<S> {
    reader: FrameReader<S>,
    bus: Arc<ControllerBus>,
    activity: ActivityNotifier,
    watchdog: Arc<dyn Watchdog>,
    last_keys: Option<ButtonState>,
}

impl<S: ByteSource> HandsetPump<S> {
    pub fn new(
        reader: FrameReader<S>,
        bus: Arc<ControllerBus>,
        activity: ActivityNotifier,
        watchdog: Arc<dyn Watchdog>,
    ) -> Self {
        Self {
            reader,
            bus,
            activity,
            watchdog,
            last_keys: None,
        }
    }

    /// Relays handset frames until `shutdown` is triggered.
    ///
    /// For every frame the reader yields:
    ///
    /// 1. The watchdog is fed (inside `next_frame`), whatever the frame says.
    /// 2. The frame is classified; anything other than a trusted key frame
    ///    is logged and dropped.
    /// 3. A non-empty key set restarts the keep-alive deadline.
    /// 4. The original bytes go to the controller if no burst holds the bus.
    ///
    /// # Parameters
    ///
    /// - `shutdown` – Checked before every poll of the handset line.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        info!("handset pump started");
        while let Some(frame) =
            next_frame(&mut self.reader, &mut shutdown, self.watchdog.as_ref(), "handset").await
        {
            self.handle(&frame);
        }
        info!("handset pump stopped");
    }

    fn handle(&mut self, frame: &Frame) {
        // ── Step 2: only trusted key frames are relayed ──────────────────────
        let keys = match classify(frame) {
            FrameKind::Button(keys) => keys,
            FrameKind::Malformed(e) => {
                warn!(%frame, "handset frame rejected: {e}");
                return;
            }
            other => {
                warn!(%frame, "unexpected frame on handset line: {other:?}");
                return;
            }
        };
        if let Some(mismatch) = keys.mismatch {
            warn!(%frame, "handset frame not relayed: {mismatch}");
            return;
        }

        if self.last_keys != Some(keys.value) {
            info!(keys = %keys.value, "handset");
            self.last_keys = Some(keys.value);
        }

        // ── Step 3: real key presses count as activity ───────────────────────
        if !keys.value.is_empty() {
            self.activity.notify();
        }

        // ── Step 4: relay unchanged, or drop if a burst holds the bus ────────
        if let Err(e) = self.bus.try_forward(frame) {
            warn!(%frame, "relay to controller failed: {e}");
        }
    }
}

// ── Controller → handset ──────────────────────────────────────────────────────

/// Tracks the controller display and optionally relays it to the handset.
pub struct ControllerPump<S> {
    reader: FrameReader<S>,
    position: Arc<PositionCache>,
    faults: Arc<dyn FaultSink>,
    handset: Option<Box<dyn ByteSink>>,
    watchdog: Arc<dyn Watchdog>,
    last_reading: Option<DisplayReading>,
}

impl<S: ByteSource> ControllerPump<S> {
    /// `handset` is the line to relay display frames to; `None` disables
    /// pass-through.
    pub fn new(
        reader: FrameReader<S>,
        position: Arc<PositionCache>,
        faults: Arc<dyn FaultSink>,
        handset: Option<Box<dyn ByteSink>>,
        watchdog: Arc<dyn Watchdog>,
    ) -> Self {
        Self {
            reader,
            position,
            faults,
            handset,
            watchdog,
            last_reading: None,
        }
    }

    /// Tracks the display until `shutdown` is triggered.
    ///
    /// Trusted heights update the position cache and clear any fault; error
    /// codes are latched.  With pass-through enabled every frame read is
    /// then written to the handset unchanged, decodable or not.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        info!(passthrough = self.handset.is_some(), "controller pump started");
        while let Some(frame) =
            next_frame(&mut self.reader, &mut shutdown, self.watchdog.as_ref(), "controller").await
        {
            self.handle(&frame);
            self.relay(&frame);
        }
        info!("controller pump stopped");
    }

    fn handle(&mut self, frame: &Frame) {
        let reading = match classify(frame) {
            FrameKind::DisplayValue(height) => {
                if let Some(mismatch) = height.mismatch {
                    debug!(%frame, "height ignored: {mismatch}");
                    return;
                }
                self.position.set(height.value);
                self.faults.clear();
                DisplayReading::Height(height.value)
            }
            FrameKind::DisplayNoHeight => DisplayReading::NoHeight,
            FrameKind::DisplayReset => DisplayReading::Reset,
            FrameKind::DisplayFault(fault) => {
                if let Some(mismatch) = fault.mismatch {
                    debug!(%frame, "fault code may be garbled: {mismatch}");
                }
                self.faults.raise(fault.value);
                DisplayReading::Fault(fault.value)
            }
            FrameKind::Malformed(e) => {
                warn!(%frame, "controller frame rejected: {e}");
                return;
            }
            FrameKind::Button(_) => {
                warn!(%frame, "unexpected button frame on controller line");
                return;
            }
        };

        if self.last_reading == Some(reading) {
            trace!(%frame, "display unchanged");
            return;
        }
        match reading {
            DisplayReading::Height(p) => debug!(height = %p, "display"),
            DisplayReading::NoHeight => debug!("display blank"),
            DisplayReading::Reset => warn!("controller requests a reset"),
            DisplayReading::Fault(f) => warn!(fault = %f, "controller fault"),
        }
        self.last_reading = Some(reading);
    }

    fn relay(&mut self, frame: &Frame) {
        if let Some(handset) = self.handset.as_mut() {
            if let Err(e) = handset.write_frame(frame) {
                warn!(%frame, "relay to handset failed: {e}");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
