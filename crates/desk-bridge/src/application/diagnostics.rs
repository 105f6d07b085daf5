//! Status LED signalling and the loops that keep the watchdog fed.
//!
//! The LED shows one of three things:
//!
//! - **heartbeat**: a 10 ms blip every second while the bridge runs;
//! - **error code**: a start-up failure, repeated until shutdown;
//! - **panic**: almost always on, after a task panicked or the control
//!   listener could not be bound.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::application::ports::{OutputLine, Watchdog};
use crate::application::shutdown::ShutdownSignal;

const CODE_ON: Duration = Duration::from_millis(300);
const CODE_GAP: Duration = Duration::from_millis(250);
const CODE_GROUP_GAP: Duration = Duration::from_millis(500);
const CODE_END: Duration = Duration::from_secs(2);

/// One on/off cycle of the LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blink {
    pub on: Duration,
    pub off: Duration,
}

impl Blink {
    const fn new(on_ms: u64, off_ms: u64) -> Self {
        Self {
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(off_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinkSequence(Vec<Blink>);

impl BlinkSequence {
    pub fn heartbeat() -> Self {
        Self(vec![Blink::new(10, 990)])
    }

    pub fn panic() -> Self {
        Self(vec![Blink::new(990, 10)])
    }

    /// Encodes `code` as up to four groups of one to four flashes.
    ///
    /// Each group is one 2-bit nyblet of `code`, most significant first, and
    /// flashes `nyblet + 1` times; leading zero nyblets are skipped.  Groups
    /// are separated by a longer gap and the sequence ends with a 2 s pause.
    /// Code 0 is a single flash.
    pub fn error_code(code: u8) -> Self {
        if code == 0 {
            return Self(vec![Blink {
                on: CODE_ON,
                off: CODE_END,
            }]);
        }

        let skipped = code.leading_zeros() / 2;
        let mut blinks = Vec::with_capacity(16);
        for shift in (0..4 - skipped).rev() {
            let nyblet = (code >> (shift * 2)) & 0b11;
            for _ in 0..=nyblet {
                blinks.push(Blink {
                    on: CODE_ON,
                    off: CODE_GAP,
                });
            }
            if let Some(last) = blinks.last_mut() {
                last.off = CODE_GROUP_GAP;
            }
        }
        if let Some(last) = blinks.last_mut() {
            last.off = CODE_END;
        }
        Self(blinks)
    }

    pub fn blinks(&self) -> &[Blink] {
        &self.0
    }

    /// Length of one pass through the sequence.
    pub fn duration(&self) -> Duration {
        self.0.iter().map(|b| b.on + b.off).sum()
    }
}

/// Plays `sequence` once on `led`.
///
/// Returns `false` if shutdown interrupted it; the LED is left off either way.
pub async fn flash(
    led: &dyn OutputLine,
    sequence: &BlinkSequence,
    shutdown: &mut ShutdownSignal,
) -> bool {
    for blink in sequence.blinks() {
        for (level, hold) in [(true, blink.on), (false, blink.off)] {
            if let Err(e) = led.set(level) {
                warn!("status led write failed: {e}");
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = led.set(false);
                    return false;
                }
                _ = tokio::time::sleep(hold) => {}
            }
        }
    }
    true
}

/// Repeats `sequence` until shutdown, feeding the watchdog before each pass.
pub async fn run_indicator(
    led: Arc<dyn OutputLine>,
    watchdog: Arc<dyn Watchdog>,
    sequence: BlinkSequence,
    mut shutdown: ShutdownSignal,
) {
    while !shutdown.is_triggered() {
        watchdog.feed();
        if !flash(led.as_ref(), &sequence, &mut shutdown).await {
            break;
        }
    }
}

/// The normal-operation heartbeat.
pub async fn run_heartbeat(
    led: Arc<dyn OutputLine>,
    watchdog: Arc<dyn Watchdog>,
    shutdown: ShutdownSignal,
) {
    run_indicator(led, watchdog, BlinkSequence::heartbeat(), shutdown).await;
}

/// Flashes start-up failure `code` until shutdown.
pub async fn run_failure(
    code: u8,
    led: Arc<dyn OutputLine>,
    watchdog: Arc<dyn Watchdog>,
    shutdown: ShutdownSignal,
) {
    error!(code, "start-up failed, flashing error code");
    run_indicator(led, watchdog, BlinkSequence::error_code(code), shutdown).await;
}

/// Shows the panic pattern until shutdown, for failures after start-up that
/// have no error code.
pub async fn run_panic(
    led: Arc<dyn OutputLine>,
    watchdog: Arc<dyn Watchdog>,
    shutdown: ShutdownSignal,
) {
    error!("bridge halted, showing panic pattern");
    run_indicator(led, watchdog, BlinkSequence::panic(), shutdown).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
