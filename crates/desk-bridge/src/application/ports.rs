//! Hardware and runtime ports the bridge core is written against.
//!
//! Implementations live in the infrastructure layer (UART, sysfs GPIO,
//! software watchdog, `tracing` reload handle) and in the `mock` modules used
//! by tests.

use std::io;

use tokio::sync::broadcast;

use desk_core::{ControllerFault, Frame};

/// Receiving side of a serial line.
///
/// Both methods must return promptly; the frame reader polls `available`
/// and sleeps between polls rather than blocking inside `read`.
pub trait ByteSource: Send {
    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> io::Result<usize>;

    /// Reads up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Transmitting side of a serial line.
pub trait ByteSink: Send {
    /// Writes one whole frame.
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()>;
}

/// A digital output such as the activity line or the status LED.
#[cfg_attr(test, mockall::automock)]
pub trait OutputLine: Send + Sync {
    fn set(&self, high: bool) -> io::Result<()>;
}

/// A digital input such as the manual override switch.
#[cfg_attr(test, mockall::automock)]
pub trait InputLine: Send + Sync {
    fn is_high(&self) -> io::Result<bool>;
}

/// Liveness contract: the process is considered hung when nobody calls
/// [`Watchdog::feed`] within the watchdog timeout.
#[cfg_attr(test, mockall::automock)]
pub trait Watchdog: Send + Sync {
    fn feed(&self);
}

/// Receives the controller's own error state as it appears on the display.
pub trait FaultSink: Send + Sync {
    /// The controller is showing `fault`.
    fn raise(&self, fault: ControllerFault);

    /// The controller is showing a height again.
    fn clear(&self);
}

/// Runtime control over the log filter.
pub trait LogLevelControl: Send + Sync {
    /// Replaces the active filter with `directive`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the directive does not parse or
    /// the filter cannot be swapped.
    fn set_level(&self, directive: &str) -> Result<(), String>;
}

/// Live copy of the bridge's formatted log output.
pub trait LogFeed: Send + Sync {
    /// Receives every line logged from now on.  A receiver that falls behind
    /// skips lines and learns how many through `RecvError::Lagged`.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}
