//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is deserialized from a TOML file in which every field is optional, so an
//! empty file (or no file at all) yields [`BridgeConfig::default`].  CLI flags
//! are applied on top by `main.rs`.
//!
//! ```toml
//! log_level = "info"
//!
//! [serial]
//! handset = "/dev/ttyAMA0"
//! controller = "/dev/ttyAMA1"
//!
//! [bridge]
//! passthrough = false
//! keepalive_interval_secs = 900
//!
//! [gpio]
//! activity = "/sys/class/gpio/gpio16/value"
//! manual_override = "/sys/class/gpio/gpio15/value"
//! poll_interval_ms = 10
//!
//! [control]
//! bind = "0.0.0.0:8080"
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All runtime configuration for the desk bridge.
///
/// # Example
///
/// ```rust
/// use desk_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::from_toml_str("[bridge]\npassthrough = true\n").unwrap();
/// assert!(cfg.bridge.passthrough);
/// assert_eq!(cfg.serial.baud_rate, 9600);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Initial `tracing` filter directive, e.g. `"info"` or `"desk_bridge=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub bridge: PumpConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

/// UART settings for both desk lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    /// Device the handset is wired to.
    #[serde(default = "default_handset_port")]
    pub handset: String,
    /// Device the controller is wired to.
    #[serde(default = "default_controller_port")]
    pub controller: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// How long a reader sleeps when no bytes are waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Relay and command behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PumpConfig {
    /// Forward controller frames back out to the handset line.
    #[serde(default)]
    pub passthrough: bool,
    /// Copies of a command frame written per request.
    #[serde(default = "default_burst_count")]
    pub burst_count: u32,
    #[serde(default = "default_burst_spacing_ms")]
    pub burst_spacing_ms: u64,
    /// Delay between raising the activity line and the first write.
    #[serde(default = "default_activity_settle_ms")]
    pub activity_settle_ms: u64,
    /// Idle time before a keep-alive burst is injected.  The controller
    /// drops off the bus after roughly 18 minutes without handset activity.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

/// Sysfs GPIO value files.  Absent lines are replaced by no-op lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpioConfig {
    /// Driven high while the bridge writes its own frames to the controller.
    #[serde(default)]
    pub activity: Option<PathBuf>,
    /// When high, remote commands are refused.
    #[serde(default)]
    pub manual_override: Option<PathBuf>,
    /// Heartbeat and diagnostic blink output.
    #[serde(default)]
    pub status_led: Option<PathBuf>,
    /// How often the manual override input is sampled and mirrored onto
    /// the activity line.
    #[serde(default = "default_gpio_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchdogConfig {
    /// Maximum time without a liveness refresh before the process exits.
    #[serde(default = "default_watchdog_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlConfig {
    /// WebSocket listener address.
    #[serde(default = "default_control_bind")]
    pub bind: SocketAddr,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_handset_port() -> String {
    "/dev/ttyAMA0".to_string()
}
fn default_controller_port() -> String {
    "/dev/ttyAMA1".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_poll_interval_ms() -> u64 {
    10
}
fn default_gpio_poll_interval_ms() -> u64 {
    10
}
fn default_burst_count() -> u32 {
    5
}
fn default_burst_spacing_ms() -> u64 {
    10
}
fn default_activity_settle_ms() -> u64 {
    1
}
fn default_keepalive_interval_secs() -> u64 {
    15 * 60
}
fn default_watchdog_timeout_ms() -> u64 {
    10_000
}
fn default_control_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            serial: SerialConfig::default(),
            bridge: PumpConfig::default(),
            gpio: GpioConfig::default(),
            watchdog: WatchdogConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            handset: default_handset_port(),
            controller: default_controller_port(),
            baud_rate: default_baud_rate(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            passthrough: false,
            burst_count: default_burst_count(),
            burst_spacing_ms: default_burst_spacing_ms(),
            activity_settle_ms: default_activity_settle_ms(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            activity: None,
            manual_override: None,
            status_led: None,
            poll_interval_ms: default_gpio_poll_interval_ms(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_watchdog_timeout_ms(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind: default_control_bind(),
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// A setting that parses but cannot drive the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} must be greater than zero")]
pub struct InvalidSetting {
    /// Dotted TOML path of the offending field.
    pub field: &'static str,
}

// ── Accessors ─────────────────────────────────────────────────────────────────

impl BridgeConfig {
    /// Parses a TOML document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input or mistyped fields.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Rejects zero rates, intervals and burst counts.
    ///
    /// A zero poll interval would spin the readers and a zero keep-alive
    /// interval would fire bursts back to back.  `watchdog.timeout_ms` is
    /// checked when the watchdog is opened, which reports its own LED code.
    ///
    /// # Errors
    ///
    /// Returns the first zero field, in file order.
    pub fn validate(&self) -> Result<(), InvalidSetting> {
        let settings = [
            ("serial.baud_rate", u64::from(self.serial.baud_rate)),
            ("serial.poll_interval_ms", self.serial.poll_interval_ms),
            ("bridge.burst_count", u64::from(self.bridge.burst_count)),
            ("bridge.keepalive_interval_secs", self.bridge.keepalive_interval_secs),
            ("gpio.poll_interval_ms", self.gpio.poll_interval_ms),
        ];
        match settings.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(InvalidSetting { field }),
            None => Ok(()),
        }
    }
}

impl SerialConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PumpConfig {
    pub fn burst_spacing(&self) -> Duration {
        Duration::from_millis(self.burst_spacing_ms)
    }

    pub fn activity_settle(&self) -> Duration {
        Duration::from_millis(self.activity_settle_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

impl GpioConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl WatchdogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_serial_settings() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.serial.baud_rate, 9600);
        assert_eq!(cfg.serial.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_default_burst_is_five_writes_ten_ms_apart() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.bridge.burst_count, 5);
        assert_eq!(cfg.bridge.burst_spacing(), Duration::from_millis(10));
        assert_eq!(cfg.bridge.activity_settle(), Duration::from_millis(1));
    }

    #[test]
    fn test_default_keepalive_is_fifteen_minutes() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.bridge.keepalive_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_default_watchdog_timeout_is_ten_seconds() {
        assert_eq!(
            BridgeConfig::default().watchdog.timeout(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_default_gpio_lines_are_absent() {
        let cfg = BridgeConfig::default();
        assert!(cfg.gpio.activity.is_none());
        assert!(cfg.gpio.manual_override.is_none());
        assert!(cfg.gpio.status_led.is_none());
    }

    #[test]
    fn test_empty_toml_equals_default() {
        let cfg = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        // Arrange
        let text = r#"
            log_level = "debug"

            [serial]
            controller = "/dev/ttyUSB1"

            [gpio]
            manual_override = "/sys/class/gpio/gpio15/value"

            [control]
            bind = "127.0.0.1:9000"
        "#;

        // Act
        let cfg = BridgeConfig::from_toml_str(text).unwrap();

        // Assert
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.serial.controller, "/dev/ttyUSB1");
        assert_eq!(cfg.serial.handset, "/dev/ttyAMA0");
        assert_eq!(
            cfg.gpio.manual_override,
            Some(PathBuf::from("/sys/class/gpio/gpio15/value"))
        );
        assert_eq!(cfg.control.bind.port(), 9000);
        assert_eq!(cfg.bridge, PumpConfig::default());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(BridgeConfig::default().validate(), Ok(()));
        assert_eq!(
            BridgeConfig::default().gpio.poll_interval(),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_zero_poll_interval_is_invalid() {
        let cfg = BridgeConfig::from_toml_str("[serial]\npoll_interval_ms = 0\n").unwrap();

        assert_eq!(
            cfg.validate(),
            Err(InvalidSetting {
                field: "serial.poll_interval_ms"
            })
        );
    }

    #[test]
    fn test_zero_keepalive_interval_is_invalid() {
        let mut cfg = BridgeConfig::default();
        cfg.bridge.keepalive_interval_secs = 0;

        let err = cfg.validate().unwrap_err();

        assert_eq!(err.field, "bridge.keepalive_interval_secs");
        assert_eq!(
            err.to_string(),
            "bridge.keepalive_interval_secs must be greater than zero"
        );
    }

    #[test]
    fn test_zero_watchdog_timeout_is_left_to_the_watchdog() {
        let mut cfg = BridgeConfig::default();
        cfg.watchdog.timeout_ms = 0;

        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_mistyped_field_is_rejected() {
        let result = BridgeConfig::from_toml_str("[serial]\nbaud_rate = \"fast\"\n");
        assert!(result.is_err());
    }
}
