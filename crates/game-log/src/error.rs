//! Error types for log discovery and tailing.

use std::path::PathBuf;

/// The active log file could not be determined. Always recoverable.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("log directory not accessible: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no matching log files in {0}")]
    NoMatches(PathBuf),
}

/// Errors produced while reading the tailed file.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no log file is open")]
    NotOpen,
}
