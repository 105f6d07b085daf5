//! `tracing` subscriber set-up with a runtime-adjustable filter and a live
//! feed of formatted lines for control clients.

use std::io;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::application::ports::{LogFeed, LogLevelControl};

/// Lines buffered per live subscriber before it starts lagging.
const TAP_CAPACITY: usize = 256;

/// Swaps the active [`EnvFilter`] behind a reload layer.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogControl {
    /// The directive currently in force.
    pub fn current(&self) -> Option<String> {
        self.handle
            .with_current(|filter| filter.to_string().to_lowercase())
            .ok()
    }
}

impl LogLevelControl for LogControl {
    fn set_level(&self, directive: &str) -> Result<(), String> {
        let filter = EnvFilter::try_new(directive).map_err(|e| e.to_string())?;
        let previous = self.current();
        self.handle.reload(filter).map_err(|e| e.to_string())?;
        info!(from = previous.as_deref().unwrap_or("?"), to = directive, "log filter changed");
        Ok(())
    }
}

/// Fans every formatted event out to live subscribers.
///
/// Used as the writer of a second `fmt` layer; with nobody subscribed the
/// lines are not even buffered.
#[derive(Clone)]
pub struct LogTap {
    tx: broadcast::Sender<String>,
}

impl LogTap {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(TAP_CAPACITY);
        Self { tx }
    }
}

impl Default for LogTap {
    fn default() -> Self {
        Self::new()
    }
}

impl LogFeed for LogTap {
    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl<'a> MakeWriter<'a> for LogTap {
    type Writer = TapLine;

    fn make_writer(&'a self) -> TapLine {
        TapLine {
            tx: (self.tx.receiver_count() > 0).then(|| self.tx.clone()),
            buf: Vec::new(),
        }
    }
}

/// Collects one formatted event and publishes it when dropped.
pub struct TapLine {
    tx: Option<broadcast::Sender<String>>,
    buf: Vec<u8>,
}

impl io::Write for TapLine {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.tx.is_some() {
            self.buf.extend_from_slice(bytes);
        }
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TapLine {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else { return };
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            // No receivers left is not an error here.
            let _ = tx.send(line.to_string());
        }
    }
}

/// Filter from `RUST_LOG` if set and valid, otherwise `default_directive`.
pub fn initial_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Builds the reloadable filter layer without installing anything.
pub fn reloadable(filter: EnvFilter) -> (reload::Layer<EnvFilter, Registry>, LogControl) {
    let (layer, handle) = reload::Layer::new(filter);
    (layer, LogControl { handle })
}

/// Installs the global subscriber: the reloadable filter, stderr output and
/// the live tap.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(default_directive: &str) -> anyhow::Result<(LogControl, LogTap)> {
    let (filter, control) = reloadable(initial_filter(default_directive));
    let tap = LogTap::new();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(tap.clone()))
        .try_init()
        .context("installing tracing subscriber")?;
    Ok((control, tap))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
