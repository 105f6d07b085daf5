//! Loading [`BridgeConfig`] from a TOML file.
//!
//! A missing file is not an error: the bridge runs on defaults (and logs
//! that it did), which is the usual first-boot situation.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::config::{BridgeConfig, InvalidSetting};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] InvalidSetting),
}

/// Reads and parses `path`, or returns the defaults if it does not exist.
///
/// # Errors
///
/// - [`ConfigError::Io`] when the file exists but cannot be read.
/// - [`ConfigError::Parse`] when it is not valid configuration TOML.
/// - [`ConfigError::Invalid`] when a rate, interval or count is zero.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let config = BridgeConfig::from_toml_str(&text)?;
            config.validate()?;
            info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(BridgeConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
