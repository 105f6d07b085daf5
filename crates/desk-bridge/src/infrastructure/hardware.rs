//! Opening every device the bridge needs, with a diagnostic code per failure.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::ports::{InputLine, OutputLine};
use crate::domain::config::{BridgeConfig, GpioConfig, WatchdogConfig};
use crate::infrastructure::gpio::{NullLine, SysfsInput, SysfsOutput};
use crate::infrastructure::serial::{open_uart, UartReader, UartWriter};
use crate::infrastructure::watchdog::SoftwareWatchdog;

/// A start-up failure.  [`InitError::code`] is what the status LED flashes.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("gpio line {path}: {source}")]
    Gpio {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("controller uart {path}: {source}")]
    ControllerUart {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("handset uart {path}: {source}")]
    HandsetUart {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("watchdog: {0}")]
    Watchdog(String),
}

impl InitError {
    pub fn code(&self) -> u8 {
        match self {
            InitError::Gpio { .. } => 1,
            InitError::ControllerUart { .. } => 2,
            InitError::HandsetUart { .. } => 3,
            InitError::Watchdog(_) => 4,
        }
    }
}

/// Opened devices, ready to be wired into the bridge.
pub struct Hardware {
    pub handset_rx: UartReader,
    pub handset_tx: UartWriter,
    pub controller_rx: UartReader,
    pub controller_tx: UartWriter,
    pub activity: Arc<dyn OutputLine>,
    pub manual_override: Arc<dyn InputLine>,
}

impl Hardware {
    /// Opens the GPIO lines, then the controller UART, then the handset UART.
    ///
    /// # Errors
    ///
    /// Returns the first [`InitError`] encountered.
    pub fn open(config: &BridgeConfig) -> Result<Self, InitError> {
        let activity = open_output(config.gpio.activity.as_deref())?;
        let manual_override = open_input(config.gpio.manual_override.as_deref())?;

        let serial = &config.serial;
        let (controller_rx, controller_tx) =
            open_uart(&serial.controller, serial.baud_rate).map_err(|source| {
                InitError::ControllerUart {
                    path: serial.controller.clone(),
                    source,
                }
            })?;
        let (handset_rx, handset_tx) =
            open_uart(&serial.handset, serial.baud_rate).map_err(|source| {
                InitError::HandsetUart {
                    path: serial.handset.clone(),
                    source,
                }
            })?;

        info!(
            handset = %serial.handset,
            controller = %serial.controller,
            baud = serial.baud_rate,
            "hardware ready"
        );
        Ok(Self {
            handset_rx,
            handset_tx,
            controller_rx,
            controller_tx,
            activity,
            manual_override,
        })
    }
}

/// Opens the status LED, or a [`NullLine`] when none is configured.
///
/// # Errors
///
/// [`InitError::Gpio`] when the configured line cannot be opened.
pub fn open_status_led(config: &GpioConfig) -> Result<Arc<dyn OutputLine>, InitError> {
    open_output(config.status_led.as_deref())
}

/// Creates the software watchdog.
///
/// # Errors
///
/// [`InitError::Watchdog`] for a zero timeout, which would expire at once.
pub fn open_watchdog(config: &WatchdogConfig) -> Result<Arc<SoftwareWatchdog>, InitError> {
    if config.timeout_ms == 0 {
        return Err(InitError::Watchdog("timeout must be non-zero".to_string()));
    }
    Ok(Arc::new(SoftwareWatchdog::new(config.timeout())))
}

fn open_output(path: Option<&Path>) -> Result<Arc<dyn OutputLine>, InitError> {
    match path {
        Some(path) => {
            let line = SysfsOutput::open(path).map_err(|source| InitError::Gpio {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "output line opened");
            Ok(Arc::new(line))
        }
        None => Ok(Arc::new(NullLine)),
    }
}

fn open_input(path: Option<&Path>) -> Result<Arc<dyn InputLine>, InitError> {
    match path {
        Some(path) => {
            let line = SysfsInput::open(path).map_err(|source| InitError::Gpio {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "input line opened");
            Ok(Arc::new(line))
        }
        None => Ok(Arc::new(NullLine)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
