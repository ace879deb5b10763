//! Scanner configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux and macOS: `~/.config/roomscan/scanner.toml`
//! - Windows: `%APPDATA%/roomscan/scanner.toml`

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use roomscan_scanner::ScanConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured log directory.
pub const LOG_DIR_ENV: &str = "ROOMSCAN_LOG_DIR";

/// How notifications are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable lines.
    Text,
}

/// Scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Notification output format.
    #[serde(default = "default_output")]
    pub output: OutputFormat,

    /// Scan session settings.
    #[serde(default)]
    pub scan: ScanConfig,
}

fn default_output() -> OutputFormat {
    OutputFormat::Json
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: default_output(),
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the platform path, or creates a default if
    /// not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads configuration from `path`, writing the defaults there if the
    /// file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the current configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Replaces the log directory with `value` when it is set and non-empty.
    pub fn apply_log_dir_override(&mut self, value: Option<OsString>) {
        if let Some(dir) = value.filter(|v| !v.is_empty()) {
            tracing::debug!(dir = ?dir, "log directory overridden from environment");
            self.scan.log_dir = Some(PathBuf::from(dir));
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("roomscan").join("scanner.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("roomscan")
            .join("scanner.toml"))
    }
}
