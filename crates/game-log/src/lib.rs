//! Game log discovery, tailing and classification.
//!
//! The locator picks the active log file in a directory, the tailer reads
//! complete lines appended to it since the last poll, and the classifier
//! turns interesting lines into typed signals. Nothing here spawns threads
//! or sleeps; callers decide when to poll.

mod classifier;
mod error;
mod locator;
mod tailer;

pub use classifier::{Extract, LineClassifier, LogSignal, MarkerRule};
pub use error::{LocateError, TailError};
pub use locator::{Locate, LogLocator, LogPattern, default_log_dir, find_latest_log};
pub use tailer::{Cursor, CursorPolicy, PollOutcome, TailReader, TailStats};

/// Default per-poll read budget in bytes.
pub const DEFAULT_MAX_READ_BYTES: usize = 64 * 1024;

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
