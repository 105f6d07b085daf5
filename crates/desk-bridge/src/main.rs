//! Standing-desk bridge: entry point.
//!
//! Sits on the serial link between a desk's handset and its motor controller,
//! relays both directions, remembers the displayed height, keeps the
//! controller awake and accepts preset commands over WebSocket.
//!
//! # Usage
//!
//! ```text
//! desk-bridge [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>          TOML configuration file [default: /etc/desk-bridge.toml]
//!       --log-level <FILTER>     Log filter, overrides the file
//!       --handset <DEVICE>       Handset UART, overrides the file
//!       --controller <DEVICE>    Controller UART, overrides the file
//!       --bind <ADDR>            Control server address, overrides the file
//!       --passthrough            Relay controller frames back to the handset
//!       --keepalive-secs <SECS>  Idle time before a keep-alive burst
//! ```
//!
//! Every option can also be set through a `DESK_*` environment variable
//! (`DESK_CONFIG`, `DESK_LOG_LEVEL`, ...); `RUST_LOG` overrides both the file
//! and `--log-level`.
//!
//! # Exit status
//!
//! Non-zero when start-up fails or a task panics (in both cases after
//! shutdown ends the LED loop) and when the watchdog expires.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use desk_bridge::application::ports::{ByteSink, LogLevelControl, OutputLine};
use desk_bridge::application::{
    diagnostics, shutdown, BurstTiming, ControlService, ControllerBus, ControllerPump, DeskBridge,
    FaultLatch, FrameReader, HandsetPump, KeepAlive, OverrideMirror, PositionCache,
    ShutdownHandle, ShutdownSignal,
};
use desk_bridge::domain::{BridgeConfig, WatchdogConfig};
use desk_bridge::infrastructure::gpio::NullLine;
use desk_bridge::infrastructure::{
    control_server, load_config, logging, open_status_led, open_watchdog, Hardware, InitError,
    LogControl, LogTap, SoftwareWatchdog,
};
use desk_core::{CONTROLLER_HEADER, HANDSET_HEADER};

const DEFAULT_CONFIG_PATH: &str = "/etc/desk-bridge.toml";
const DEFAULT_LOG_LEVEL: &str = "info";

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Serial man-in-the-middle bridge for a standing desk.
#[derive(Debug, Parser)]
#[command(name = "desk-bridge", version)]
struct Cli {
    /// TOML configuration file; a missing file means defaults.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "DESK_CONFIG")]
    config: PathBuf,

    /// Log filter directive, e.g. `debug` or `desk_bridge=trace`.
    #[arg(long, env = "DESK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Handset UART device.
    #[arg(long, env = "DESK_HANDSET")]
    handset: Option<String>,

    /// Controller UART device.
    #[arg(long, env = "DESK_CONTROLLER")]
    controller: Option<String>,

    /// Control server listen address.
    #[arg(long, env = "DESK_BIND")]
    bind: Option<SocketAddr>,

    /// Relay controller frames back to the handset.
    #[arg(long, env = "DESK_PASSTHROUGH")]
    passthrough: bool,

    /// Idle seconds before a keep-alive burst.
    #[arg(long, env = "DESK_KEEPALIVE_SECS")]
    keepalive_secs: Option<u64>,
}

impl Cli {
    /// Applies the command-line overrides on top of `config`.
    fn apply(&self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(handset) = &self.handset {
            config.serial.handset = handset.clone();
        }
        if let Some(controller) = &self.controller {
            config.serial.controller = controller.clone();
        }
        if let Some(bind) = self.bind {
            config.control.bind = bind;
        }
        if self.passthrough {
            config.bridge.passthrough = true;
        }
        if let Some(secs) = self.keepalive_secs {
            config.bridge.keepalive_interval_secs = secs;
        }
        config
    }

    /// Loads the config file, applies the overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if a rate, interval or count ends up zero.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let config = load_config(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        let config = self.apply(config);
        config.validate().context("invalid command-line override")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Installed before the config is read so that loading is logged; the
    // file's level is applied afterwards unless something overrides it.
    let (logs, tap) = logging::init(cli.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))?;
    let level_from_cli = cli.log_level.is_some();
    let config = cli.into_bridge_config()?;
    if !level_from_cli && std::env::var_os("RUST_LOG").is_none() {
        if let Err(e) = logs.set_level(&config.log_level) {
            warn!("ignoring log_level {:?}: {e}", config.log_level);
        }
    }

    info!(
        handset = %config.serial.handset,
        controller = %config.serial.controller,
        control = %config.control.bind,
        "desk bridge starting"
    );

    let (shutdown, signal) = shutdown::channel();
    let shutdown = Arc::new(shutdown);
    spawn_ctrl_c(Arc::clone(&shutdown));

    let led = match open_status_led(&config.gpio) {
        Ok(led) => led,
        Err(e) => return init_failed(e, Arc::new(NullLine), fallback_watchdog(), signal).await,
    };
    let watchdog = match open_watchdog(&config.watchdog) {
        Ok(watchdog) => watchdog,
        Err(e) => return init_failed(e, led, fallback_watchdog(), signal).await,
    };
    let hardware = match Hardware::open(&config) {
        Ok(hardware) => hardware,
        Err(e) => return init_failed(e, led, watchdog, signal).await,
    };

    let wiring = Wiring {
        led: Arc::clone(&led),
        watchdog: Arc::clone(&watchdog),
        logs,
        tap,
    };
    match run_bridge(config, hardware, wiring, signal.clone()).await {
        Ok(()) => {}
        Err(Halt::Stalled(e)) => return Err(e),
        Err(Halt::Fault(e)) => {
            error!("bridge failed: {e:#}");
            diagnostics::run_panic(led, watchdog, signal).await;
            return Err(e);
        }
    }

    info!("desk bridge stopped");
    Ok(())
}

fn spawn_ctrl_c(shutdown: Arc<ShutdownHandle>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                shutdown.trigger();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });
}

fn fallback_watchdog() -> Arc<SoftwareWatchdog> {
    Arc::new(SoftwareWatchdog::new(WatchdogConfig::default().timeout()))
}

/// Flashes the failure code until shutdown, then reports the failure.
async fn init_failed(
    err: InitError,
    led: Arc<dyn OutputLine>,
    watchdog: Arc<SoftwareWatchdog>,
    signal: ShutdownSignal,
) -> anyhow::Result<()> {
    error!(code = err.code(), "initialisation failed: {err}");
    diagnostics::run_failure(err.code(), led, watchdog, signal).await;
    Err(anyhow::Error::new(err).context("initialisation failed"))
}

// ── Bridge wiring ─────────────────────────────────────────────────────────────

/// Why the bridge stopped before shutdown was requested.
enum Halt {
    /// The watchdog expired; the process exits and its supervisor restarts it.
    Stalled(anyhow::Error),
    /// A task panicked or the control listener could not be bound; the LED
    /// shows the panic pattern until shutdown.
    Fault(anyhow::Error),
}

/// Handles opened before the bridge itself.
struct Wiring {
    led: Arc<dyn OutputLine>,
    watchdog: Arc<SoftwareWatchdog>,
    logs: LogControl,
    tap: LogTap,
}

/// Wires the opened hardware into the bridge and runs until shutdown, a
/// task failure or watchdog expiry.
///
/// # Parameters
///
/// - `config`   – Validated configuration.
/// - `hardware` – Serial halves and GPIO lines from [`Hardware::open`].
/// - `wiring`   – Status LED, watchdog and logging handles.
/// - `signal`   – Process shutdown; ends the bridge normally.
///
/// The tasks run on a shutdown channel of their own, so a halt stops them
/// (control sessions included) while `signal` stays untriggered for the
/// caller's LED loop.
///
/// # Errors
///
/// [`Halt::Stalled`] on watchdog expiry, [`Halt::Fault`] when a task panics
/// or the listener cannot be bound.
async fn run_bridge(
    config: BridgeConfig,
    hardware: Hardware,
    wiring: Wiring,
    mut signal: ShutdownSignal,
) -> Result<(), Halt> {
    let Wiring {
        led,
        watchdog,
        logs,
        tap,
    } = wiring;

    // ── Step 1: Shared controller bus and caches ──────────────────────────────
    let timing = BurstTiming {
        count: config.bridge.burst_count,
        spacing: config.bridge.burst_spacing(),
        settle: config.bridge.activity_settle(),
    };
    let bus = Arc::new(ControllerBus::new(
        Box::new(hardware.controller_tx),
        Arc::clone(&hardware.activity),
        timing,
    ));
    let (keepalive, activity) = KeepAlive::new(Arc::clone(&bus), config.bridge.keepalive_interval());
    let position = Arc::new(PositionCache::new());
    let faults = Arc::new(FaultLatch::new());
    let poll = config.serial.poll_interval();

    // ── Step 2: Relay loops ───────────────────────────────────────────────────
    let handset_pump = HandsetPump::new(
        FrameReader::new(hardware.handset_rx, HANDSET_HEADER, poll),
        Arc::clone(&bus),
        activity.clone(),
        watchdog.clone(),
    );
    let passthrough: Option<Box<dyn ByteSink>> = if config.bridge.passthrough {
        Some(Box::new(hardware.handset_tx))
    } else {
        None
    };
    let controller_pump = ControllerPump::new(
        FrameReader::new(hardware.controller_rx, CONTROLLER_HEADER, poll),
        Arc::clone(&position),
        faults.clone(),
        passthrough,
        watchdog.clone(),
    );
    let mirror = OverrideMirror::new(
        Arc::clone(&hardware.manual_override),
        hardware.activity,
        config.gpio.poll_interval(),
    );

    // ── Step 3: Control front end ─────────────────────────────────────────────
    let bridge = Arc::new(DeskBridge::new(
        bus,
        position,
        faults,
        hardware.manual_override,
        activity,
    ));
    let service = Arc::new(ControlService::new(bridge, Arc::new(logs), Arc::new(tap)));
    let listener = control_server::bind(config.control.bind)
        .await
        .map_err(Halt::Fault)?;

    // ── Step 4: Run everything under the watchdog ─────────────────────────────
    let (stop, tasks_signal) = shutdown::channel();
    let mut tasks = JoinSet::new();
    tasks.spawn(handset_pump.run(tasks_signal.clone()));
    tasks.spawn(controller_pump.run(tasks_signal.clone()));
    tasks.spawn(keepalive.run(tasks_signal.clone()));
    tasks.spawn(mirror.run(tasks_signal.clone()));
    tasks.spawn(diagnostics::run_heartbeat(led, watchdog.clone(), tasks_signal.clone()));
    tasks.spawn(control_server::serve(listener, service, tasks_signal.clone()));

    let halt = tokio::select! {
        _ = signal.cancelled() => None,
        supervised = watchdog.supervise(tasks_signal) => supervised
            .err()
            .map(|expired| Halt::Stalled(anyhow::Error::new(expired).context("bridge stalled"))),
        Some(Err(failed)) = tasks.join_next() => {
            Some(Halt::Fault(anyhow::Error::new(failed).context("bridge task panicked")))
        }
    };

    // ── Step 5: Stop the remaining tasks ──────────────────────────────────────
    stop.trigger();
    if matches!(halt, Some(Halt::Stalled(_))) {
        // A stalled task may never observe the stop signal.
        tasks.abort_all();
    }
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Err(e) if !e.is_cancelled() => error!("bridge task failed while stopping: {e}"),
            _ => {}
        }
    }
    halt.map_or(Ok(()), Err)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
