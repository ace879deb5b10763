//! Error types for scan session control.

use std::path::PathBuf;

/// Reasons a session refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("log directory is not set")]
    LogDirUnset,

    #[error("log path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("session is in the error state; reset it before starting")]
    NeedsReset,
}
