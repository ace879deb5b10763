//! Scan session configuration.

use std::path::PathBuf;
use std::time::Duration;

use roomscan_game_log::{CursorPolicy, DEFAULT_MAX_READ_BYTES, LogPattern, default_log_dir};
use serde::{Deserialize, Serialize};

/// What happens when a stopped session is started again and finds the same
/// file it was tailing before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Re-read the file from byte 0.
    Replay,
    /// Continue from the previous cursor.
    Resume,
}

/// Scan session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directory holding the game's log files.
    #[serde(default = "default_log_dir", skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Delay between ticks in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive read failures tolerated before the session errors out.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Empty polls after which the directory is checked for a newer file
    /// (0 = never).
    #[serde(default = "default_relocate_after_idle_polls")]
    pub relocate_after_idle_polls: u32,

    /// Upper bound on bytes read per poll.
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: usize,

    /// Size of the recent-room window used to flag revisits.
    #[serde(default = "default_recent_rooms")]
    pub recent_rooms: usize,

    /// Cursor placement for the first file opened after `start()`.
    #[serde(default = "default_start_policy")]
    pub start_policy: CursorPolicy,

    /// Cursor placement for files opened later in the same run.
    #[serde(default = "default_switch_policy")]
    pub switch_policy: CursorPolicy,

    /// Behavior when a restart finds the previously tailed file unchanged.
    #[serde(default = "default_restart_policy")]
    pub restart_policy: RestartPolicy,

    /// Log file naming convention.
    #[serde(default)]
    pub pattern: LogPattern,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_relocate_after_idle_polls() -> u32 {
    5
}

fn default_max_read_bytes() -> usize {
    DEFAULT_MAX_READ_BYTES
}

fn default_recent_rooms() -> usize {
    5
}

fn default_start_policy() -> CursorPolicy {
    CursorPolicy::SkipHistory
}

fn default_switch_policy() -> CursorPolicy {
    CursorPolicy::FromStart
}

fn default_restart_policy() -> RestartPolicy {
    RestartPolicy::Replay
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            failure_threshold: default_failure_threshold(),
            relocate_after_idle_polls: default_relocate_after_idle_polls(),
            max_read_bytes: default_max_read_bytes(),
            recent_rooms: default_recent_rooms(),
            start_policy: default_start_policy(),
            switch_policy: default_switch_policy(),
            restart_policy: default_restart_policy(),
            pattern: LogPattern::default(),
        }
    }
}

impl ScanConfig {
    /// Default configuration watching `log_dir`.
    pub fn for_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: Some(log_dir.into()),
            ..Self::default()
        }
    }

    /// Tick interval, never shorter than 10ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.relocate_after_idle_polls, 5);
        assert_eq!(config.max_read_bytes, 64 * 1024);
        assert_eq!(config.recent_rooms, 5);
        assert_eq!(config.start_policy, CursorPolicy::SkipHistory);
        assert_eq!(config.switch_policy, CursorPolicy::FromStart);
        assert_eq!(config.restart_policy, RestartPolicy::Replay);
        assert_eq!(config.pattern.extension, "log");
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"log_dir":"/games/logs","failure_threshold":7}"#).unwrap();
        assert_eq!(config.log_dir, Some(PathBuf::from("/games/logs")));
        assert_eq!(config.failure_threshold, 7);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.restart_policy, RestartPolicy::Replay);
    }

    #[test]
    fn policies_use_snake_case() {
        let config: ScanConfig = serde_json::from_str(
            r#"{"start_policy":"from_start","restart_policy":"resume","pattern":{"prefix":"Game_"}}"#,
        )
        .unwrap();
        assert_eq!(config.start_policy, CursorPolicy::FromStart);
        assert_eq!(config.restart_policy, RestartPolicy::Resume);
        assert_eq!(config.pattern.prefix.as_deref(), Some("Game_"));
        assert_eq!(config.pattern.extension, "log");
    }

    #[test]
    fn poll_interval_has_a_floor() {
        let config = ScanConfig {
            poll_interval_ms: 0,
            ..ScanConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(
            ScanConfig::for_dir("/x").poll_interval(),
            Duration::from_secs(1)
        );
    }
}
