//! JSON messages for the WebSocket control protocol.
//!
//! Every message is a JSON object whose `"type"` field names the variant:
//!
//! ```json
//! {"type":"get_height"}
//! {"type":"move_to","slot":2}
//! {"type":"set_remote","allow":false}
//! {"type":"set_log_level","level":"debug"}
//! {"type":"follow_logs"}
//! ```
//!
//! Each request gets exactly one response on the same connection.  After
//! `follow_logs` the connection additionally carries one `log` message per
//! line the bridge logs, until it closes.

use serde::{Deserialize, Serialize};

/// A request from a control client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Read the last height shown on the controller display.
    GetHeight,
    /// Recall memory preset `slot` (1-4).
    MoveTo { slot: u8 },
    /// Allow or refuse remote commands.
    SetRemote { allow: bool },
    /// Replace the active `tracing` filter directive.
    SetLogLevel { level: String },
    /// Stream the bridge's log output over this connection.
    FollowLogs,
}

/// The bridge's answer to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    /// `value` is `null` until the controller has reported a height.
    Height {
        value: Option<String>,
        /// Error code currently shown by the controller, e.g. `"E05"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fault: Option<String>,
    },
    Ok,
    Error { message: String },
    /// One formatted log line, sent after `follow_logs`.
    Log { line: String },
}

impl ControlRequest {
    /// Variant name used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlRequest::GetHeight => "get_height",
            ControlRequest::MoveTo { .. } => "move_to",
            ControlRequest::SetRemote { .. } => "set_remote",
            ControlRequest::SetLogLevel { .. } => "set_log_level",
            ControlRequest::FollowLogs => "follow_logs",
        }
    }
}

impl ControlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ControlResponse::Error {
            message: message.into(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
