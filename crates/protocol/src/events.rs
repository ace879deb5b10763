use serde::{Deserialize, Serialize};

use crate::types::{LogFile, RoomEvent, ServerEndpoint};

/// Lifecycle state of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Locating,
    Tailing,
    Error,
}

impl ScanState {
    /// Whether the session is between `start()` and `stop()`.
    pub fn is_running(self) -> bool {
        matches!(self, ScanState::Locating | ScanState::Tailing)
    }
}

/// Why a scan could not continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScanErrorReason {
    /// The log directory is unset or unusable.
    FatalConfig { message: String },
    /// Too many consecutive read failures on the tailed file.
    #[serde(rename_all = "camelCase")]
    IoThreshold { failures: u32, message: String },
}

impl std::fmt::Display for ScanErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanErrorReason::FatalConfig { message } => write!(f, "configuration error: {message}"),
            ScanErrorReason::IoThreshold { failures, message } => {
                write!(f, "{failures} consecutive read failures: {message}")
            }
        }
    }
}

/// Notification delivered to the presentation layer, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanNotification {
    ScanStarted,
    FileSwitched {
        file: LogFile,
    },
    RoomDetected {
        event: RoomEvent,
        /// The room was already in the recent-room window.
        #[serde(default)]
        revisit: bool,
    },
    ServerDetected {
        endpoint: ServerEndpoint,
    },
    Disconnected,
    ScanError {
        reason: ScanErrorReason,
    },
    ScanStopped,
}
