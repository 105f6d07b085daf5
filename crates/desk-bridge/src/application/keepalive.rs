//! Keep-alive injection for the controller's inactivity cutoff.
//!
//! The controller stops talking to the handset port after about 18 minutes
//! without handset activity.  [`KeepAlive`] holds a resettable deadline: real
//! activity (a key press, a remote command) restarts it, and when it expires
//! the task writes a burst of the neutral up+down chord to the controller.
//!
//! ```text
//!            activity / deadline restarted
//!              ┌──────────┐
//!              ▼          │
//!   ──► Waiting ──────────┘
//!         │  ▲
//! deadline│  │burst written, deadline restarted
//!         ▼  │
//!        Firing
//!
//!   shutdown (any state) ──► Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use desk_core::encode_keepalive;

use crate::application::bus::ControllerBus;
use crate::application::shutdown::ShutdownSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveState {
    Waiting,
    Firing,
    Stopped,
}

/// Cheap handle for reporting real user activity.
///
/// Signals go through a channel of capacity one: while a signal is pending a
/// new one is dropped, since one pending restart already covers it.
#[derive(Debug, Clone)]
pub struct ActivityNotifier {
    tx: mpsc::Sender<()>,
}

impl ActivityNotifier {
    pub fn notify(&self) {
        // Full means a restart is already pending; closed means the task is gone.
        let _ = self.tx.try_send(());
    }
}

pub struct KeepAlive {
    bus: Arc<ControllerBus>,
    interval: Duration,
    activity: mpsc::Receiver<()>,
    state: watch::Sender<KeepAliveState>,
}

impl KeepAlive {
    /// Creates the task and the notifier that resets it.
    pub fn new(bus: Arc<ControllerBus>, interval: Duration) -> (Self, ActivityNotifier) {
        let (tx, rx) = mpsc::channel(1);
        let (state, _) = watch::channel(KeepAliveState::Waiting);
        let task = Self {
            bus,
            interval,
            activity: rx,
            state,
        };
        (task, ActivityNotifier { tx })
    }

    /// Observes state transitions.
    pub fn subscribe(&self) -> watch::Receiver<KeepAliveState> {
        self.state.subscribe()
    }

    /// Runs until `shutdown` is triggered.
    ///
    /// Each iteration waits for whichever comes first:
    ///
    /// 1. shutdown, which ends the task;
    /// 2. an activity signal, which restarts the deadline;
    /// 3. the deadline, which writes one keep-alive burst.
    ///
    /// The burst itself waits for the bus and may take tens of
    /// milliseconds, so it is raced against shutdown as well.
    ///
    /// # Parameters
    ///
    /// - `shutdown` – Cancels the wait and any burst in progress.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        info!(interval = ?self.interval, "keep-alive started");
        let mut deadline = Instant::now() + self.interval;
        // Once every notifier is dropped `recv` returns `None` forever.
        let mut notifiers_alive = true;

        loop {
            self.state.send_replace(KeepAliveState::Waiting);

            // ── Step 1: wait for activity, the deadline or shutdown ──────────
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                signal = self.activity.recv(), if notifiers_alive => {
                    match signal {
                        Some(()) => {
                            debug!("activity, keep-alive deadline restarted");
                            deadline = Instant::now() + self.interval;
                        }
                        None => notifiers_alive = false,
                    }
                    continue;
                }
                _ = sleep_until(deadline) => {}
            }

            // ── Step 2: the controller has been idle; write the burst ────────
            self.state.send_replace(KeepAliveState::Firing);
            let burst = encode_keepalive();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("shutdown during keep-alive burst");
                    break;
                }
                sent = self.bus.send_burst(&burst) => match sent {
                    Ok(()) => info!("keep-alive burst sent"),
                    Err(e) => warn!("keep-alive burst failed: {e}"),
                },
            }

            // ── Step 3: restart the deadline from the end of the burst ───────
            deadline = Instant::now() + self.interval;
        }

        self.state.send_replace(KeepAliveState::Stopped);
        info!("keep-alive stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
