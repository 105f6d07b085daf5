//! Software watchdog.
//!
//! Hosts without a hardware watchdog get this one: loops call
//! [`Watchdog::feed`], and [`SoftwareWatchdog::supervise`] returns an error
//! once no feed has arrived for the whole timeout.  `main` turns that error
//! into a non-zero exit so a service manager restarts the bridge.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::error;

use crate::application::ports::Watchdog;
use crate::application::shutdown::ShutdownSignal;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("watchdog expired: no feed for {idle:?} (timeout {timeout:?})")]
pub struct WatchdogExpired {
    pub idle: Duration,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct SoftwareWatchdog {
    origin: Instant,
    /// Milliseconds from `origin` to the last feed.
    last_feed_ms: AtomicU64,
    timeout: Duration,
}

impl SoftwareWatchdog {
    /// Creates a watchdog that counts as fed at creation time.
    pub fn new(timeout: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last_feed_ms: AtomicU64::new(0),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since the last feed.
    pub fn idle(&self) -> Duration {
        let fed_at = self.origin + Duration::from_millis(self.last_feed_ms.load(Ordering::Acquire));
        Instant::now().saturating_duration_since(fed_at)
    }

    /// Checks the feed age four times per timeout until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogExpired`] as soon as a check finds the last feed
    /// older than the timeout.
    pub async fn supervise(&self, mut shutdown: ShutdownSignal) -> Result<(), WatchdogExpired> {
        let period = (self.timeout / 4).max(Duration::from_millis(1));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(period) => {
                    let idle = self.idle();
                    if idle > self.timeout {
                        error!(?idle, timeout = ?self.timeout, "watchdog expired");
                        return Err(WatchdogExpired {
                            idle,
                            timeout: self.timeout,
                        });
                    }
                }
            }
        }
    }
}

impl Watchdog for SoftwareWatchdog {
    fn feed(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_feed_ms.fetch_max(elapsed, Ordering::AcqRel);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
