//! The bridge's public operations for external callers.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use desk_core::{encode_command, ControllerFault, EncodeError, Position};

use crate::application::bus::{ControllerBus, Guarded};
use crate::application::keepalive::ActivityNotifier;
use crate::application::ports::InputLine;
use crate::application::position::{FaultLatch, PositionCache};

/// Why a remote command was refused or failed.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("remote control is disabled")]
    RemoteDisabled,

    /// Someone is operating the desk by hand.
    #[error("manual override is active")]
    ManualOverride,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("controller bus error: {0}")]
    Bus(#[from] io::Error),
}

/// Facade over the shared bridge state.
pub struct DeskBridge {
    bus: Arc<ControllerBus>,
    position: Arc<PositionCache>,
    faults: Arc<FaultLatch>,
    manual_override: Arc<dyn InputLine>,
    activity: ActivityNotifier,
    remote_enabled: AtomicBool,
}

impl DeskBridge {
    pub fn new(
        bus: Arc<ControllerBus>,
        position: Arc<PositionCache>,
        faults: Arc<FaultLatch>,
        manual_override: Arc<dyn InputLine>,
        activity: ActivityNotifier,
    ) -> Self {
        Self {
            bus,
            position,
            faults,
            manual_override,
            activity,
            remote_enabled: AtomicBool::new(true),
        }
    }

    /// Last height the controller displayed; unknown until the first reading.
    pub fn current_position(&self) -> Position {
        self.position.get()
    }

    /// Error code the controller is currently displaying, if any.
    pub fn current_fault(&self) -> Option<ControllerFault> {
        self.faults.current()
    }

    /// Recalls memory preset `slot` (1-4).
    ///
    /// Waits for the controller bus if a relay or keep-alive holds it; the
    /// command is never dropped.  The manual override is read once the bus
    /// is held, so a command that waited still yields to the handset.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::RemoteDisabled`] after `set_remote_enabled(false)`.
    /// - [`BridgeError::Encode`] for a slot outside 1-4.
    /// - [`BridgeError::ManualOverride`] while the override input is high.
    /// - [`BridgeError::Bus`] when the write or the activity line fails.
    pub async fn move_to(&self, slot: u8) -> Result<(), BridgeError> {
        if !self.remote_enabled() {
            return Err(BridgeError::RemoteDisabled);
        }
        let frame = encode_command(slot)?;

        let outcome = self
            .bus
            .send_burst_unless(&frame, self.manual_override.as_ref())
            .await?;
        if outcome == Guarded::Overridden {
            warn!(slot, "command refused: manual override active");
            return Err(BridgeError::ManualOverride);
        }
        self.activity.notify();
        info!(slot, "preset recalled");
        Ok(())
    }

    pub fn set_remote_enabled(&self, enabled: bool) {
        let previous = self.remote_enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(enabled, "remote control toggled");
        }
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote_enabled.load(Ordering::Acquire)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
