use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Filesystem identity token of a log file.
///
/// On Unix this is the `(device, inode)` pair. Elsewhere `volume` is zero and
/// `index` carries the creation time in nanoseconds, which changes whenever
/// the file is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    pub volume: u64,
    pub index: u64,
}

/// A log file as observed by the locator.
///
/// Immutable snapshot: a newer observation supersedes it rather than
/// mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFile {
    pub path: PathBuf,
    /// Modification time in milliseconds since the Unix epoch.
    pub modified: i64,
    pub id: FileId,
}

impl LogFile {
    /// Whether `other` refers to the same underlying file.
    pub fn same_file(&self, other: &LogFile) -> bool {
        self.path == other.path && self.id == other.id
    }

    /// File name component, lossily decoded.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A room encounter extracted from a single log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    pub room: String,
    /// Detection time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub line: String,
    /// Extra `key=value` pairs found after the room marker (seed, variant, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// Game server address announced in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl std::fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{port}", self.host),
            None => f.write_str(&self.host),
        }
    }
}
