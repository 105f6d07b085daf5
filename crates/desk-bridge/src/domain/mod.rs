//! Domain layer for desk-bridge.
//!
//! Plain data with no I/O: the configuration structure and the JSON control
//! messages.  Desk protocol values (positions, keys, faults) live in
//! `desk-core`.

pub mod config;
pub mod messages;

pub use config::{
    BridgeConfig, ControlConfig, GpioConfig, InvalidSetting, PumpConfig, SerialConfig,
    WatchdogConfig,
};
pub use messages::{ControlRequest, ControlResponse};
