//! Controller-reported error codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An error code the controller shows as `Exx` on the handset display.
///
/// This is a desk condition (overheating, obstruction, lost calibration, ...)
/// rather than a bridge failure; it is passed to callers as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerFault {
    /// Two-digit code, normally 0-99.
    pub code: u8,
}

impl ControllerFault {
    pub const fn new(code: u8) -> Self {
        Self { code }
    }
}

impl fmt::Display for ControllerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:02}", self.code)
    }
}

impl std::error::Error for ControllerFault {}
