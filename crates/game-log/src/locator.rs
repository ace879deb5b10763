//! Active log file discovery.
//!
//! The game keeps one log file per session in a shared directory and never
//! deletes the current one while writing it, so the most recently modified
//! match is the file to tail.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use roomscan_protocol::{FileId, LogFile};
use serde::{Deserialize, Serialize};

use crate::error::LocateError;

/// File naming convention of the game's logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPattern {
    /// Required file name prefix, compared case-sensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Required extension without the dot, compared case-insensitively.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "log".into()
}

impl Default for LogPattern {
    fn default() -> Self {
        Self {
            prefix: None,
            extension: default_extension(),
        }
    }
}

impl LogPattern {
    /// Returns whether `file_name` follows the convention.
    pub fn matches(&self, file_name: &str) -> bool {
        if let Some(prefix) = &self.prefix
            && !file_name.starts_with(prefix.as_str())
        {
            return false;
        }
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }
}

/// Something that can pick the active log file in a directory.
pub trait Locate: Send {
    fn locate(&self, dir: &Path) -> Result<LogFile, LocateError>;
}

/// Filesystem-backed locator.
#[derive(Debug, Clone, Default)]
pub struct LogLocator {
    pattern: LogPattern,
}

impl LogLocator {
    pub fn new(pattern: LogPattern) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &LogPattern {
        &self.pattern
    }
}

impl Locate for LogLocator {
    /// Selects the match with the latest modification time. Equal times are
    /// resolved by taking the lexicographically greatest file name.
    fn locate(&self, dir: &Path) -> Result<LogFile, LocateError> {
        let entries = std::fs::read_dir(dir).map_err(|source| LocateError::Unreadable {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut latest: Option<(SystemTime, String, PathBuf, Metadata)> = None;

        for entry in entries.filter_map(|entry| entry.ok()) {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !self.pattern.matches(&name) {
                continue;
            }
            let path = entry.path();
            // Follows symlinks, unlike `DirEntry::metadata`.
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(UNIX_EPOCH);

            let newer = latest.as_ref().is_none_or(|(best_time, best_name, _, _)| {
                (modified, name.as_str()) > (*best_time, best_name.as_str())
            });
            if newer {
                latest = Some((modified, name, path, meta));
            }
        }

        let (_, _, path, meta) = latest.ok_or_else(|| LocateError::NoMatches(dir.to_path_buf()))?;
        let path = std::path::absolute(&path).unwrap_or(path);

        tracing::trace!(file = %path.display(), "active log file located");

        Ok(LogFile {
            path,
            modified: system_time_millis(meta.modified().unwrap_or(UNIX_EPOCH)),
            id: file_id(&meta),
        })
    }
}

/// Finds the most recent log file matching `pattern`, if any.
pub fn find_latest_log(log_dir: &Path, pattern: &LogPattern) -> Option<LogFile> {
    LogLocator::new(pattern.clone()).locate(log_dir).ok()
}

/// Returns the game's default log directory for this platform.
///
/// `None` when the platform has no known default or the required
/// environment variable is missing.
pub fn default_log_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("LOCALAPPDATA").map(|base| PathBuf::from(base).join("Roblox").join("logs"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join("Library")
                .join("Logs")
                .join("Roblox")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        None
    }
}

pub(crate) fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
pub(crate) fn file_id(meta: &Metadata) -> FileId {
    use std::os::unix::fs::MetadataExt;
    FileId {
        volume: meta.dev(),
        index: meta.ino(),
    }
}

#[cfg(not(unix))]
pub(crate) fn file_id(meta: &Metadata) -> FileId {
    let index = meta
        .created()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    FileId { volume: 0, index }
}
