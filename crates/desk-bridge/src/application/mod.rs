//! Application layer for desk-bridge.
//!
//! Everything the bridge does, written against the hardware ports in
//! [`ports`] so that it runs unchanged on real UARTs and on the in-memory
//! mocks used by tests.
//!
//! - [`reader`]     Polls a serial line and yields frames.
//! - [`bus`]        Mutual exclusion on the controller line.
//! - [`pump`]       The handset→controller and controller→handset loops.
//! - [`keepalive`]  Injects the neutral chord before the controller sleeps.
//! - [`manual`]     Mirrors the manual override onto the activity line.
//! - [`bridge`]     Public operations: position, presets, remote enable.
//! - [`control`]    JSON request handling on top of [`bridge`].
//! - [`diagnostics`] Heartbeat and start-up failure signalling.

pub mod bridge;
pub mod bus;
pub mod control;
pub mod diagnostics;
pub mod keepalive;
pub mod manual;
pub mod ports;
pub mod position;
pub mod pump;
pub mod reader;
pub mod shutdown;

pub use bridge::{BridgeError, DeskBridge};
pub use bus::{BurstTiming, ControllerBus, Forwarded, Guarded};
pub use control::ControlService;
pub use keepalive::{ActivityNotifier, KeepAlive, KeepAliveState};
pub use manual::OverrideMirror;
pub use position::{FaultLatch, PositionCache};
pub use pump::{ControllerPump, HandsetPump};
pub use reader::{FrameReader, ReadError};
pub use shutdown::{ShutdownHandle, ShutdownSignal};
