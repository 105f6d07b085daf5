//! Infrastructure layer for desk-bridge.
//!
//! Everything that touches the outside world: UARTs, sysfs GPIO, the
//! software watchdog, the WebSocket control server, the config file and the
//! `tracing` subscriber.  The application layer only sees these through the
//! traits in [`crate::application::ports`].

pub mod config_file;
pub mod control_server;
pub mod gpio;
pub mod hardware;
pub mod logging;
pub mod serial;
pub mod watchdog;

pub use config_file::{load_config, ConfigError};
pub use hardware::{open_status_led, open_watchdog, Hardware, InitError};
pub use logging::{LogControl, LogTap};
pub use watchdog::{SoftwareWatchdog, WatchdogExpired};
