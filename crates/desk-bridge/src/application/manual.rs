//! Mirrors the handset's manual override input onto the activity line.
//!
//! While someone holds the override, the controller sees the same level on
//! the activity line that it sees during a bridge burst, so it treats the
//! handset as the active talker.  The input is sampled rather than
//! interrupt-driven; a level is written only when it changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::application::ports::{InputLine, OutputLine};
use crate::application::shutdown::ShutdownSignal;

pub struct OverrideMirror {
    input: Arc<dyn InputLine>,
    activity: Arc<dyn OutputLine>,
    poll: Duration,
}

impl OverrideMirror {
    pub fn new(input: Arc<dyn InputLine>, activity: Arc<dyn OutputLine>, poll: Duration) -> Self {
        Self {
            input,
            activity,
            poll,
        }
    }

    /// Samples the override every `poll` until `shutdown`, then leaves the
    /// activity line low if it was left high.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        debug!(poll = ?self.poll, "override mirror started");
        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut mirrored = false;
        let mut read_failing = false;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let level = match self.input.is_high() {
                Ok(level) => {
                    read_failing = false;
                    level
                }
                Err(e) => {
                    if !read_failing {
                        warn!("manual override read failed: {e}");
                        read_failing = true;
                    }
                    continue;
                }
            };
            if level == mirrored {
                continue;
            }
            match self.activity.set(level) {
                Ok(()) => {
                    info!(held = level, "manual override");
                    mirrored = level;
                }
                Err(e) => warn!("activity line write failed: {e}"),
            }
        }

        if mirrored {
            if let Err(e) = self.activity.set(false) {
                warn!("failed to lower activity line: {e}");
            }
        }
        debug!("override mirror stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
