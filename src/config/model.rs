//! Configuration data model.
//!
//! Every field has a default so a missing file or a partial one both work.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transcript buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_mouse_scroll_lines")]
    pub mouse_scroll_lines: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            mouse_scroll_lines: default_mouse_scroll_lines(),
        }
    }
}

/// Desktop attention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl NotifierConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

/// Diagnostic log settings. The file is only used by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl LoggingConfig {
    /// `file` with a leading `~` expanded to the home directory.
    pub fn file_path(&self) -> PathBuf {
        expand_home(&self.file)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: default_log_file(),
        }
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

fn default_true() -> bool {
    true
}
fn default_max_entries() -> usize {
    crate::history::DEFAULT_MAX_ENTRIES
}
fn default_mouse_scroll_lines() -> usize {
    3
}
fn default_poll_interval_ms() -> u64 {
    crate::notify::DEFAULT_POLL_INTERVAL.as_millis() as u64
}
fn default_throttle_ms() -> u64 {
    crate::notify::DEFAULT_THROTTLE.as_millis() as u64
}
fn default_level() -> String {
    "info".to_string()
}
fn default_log_file() -> String {
    "~/.local/share/crabrelay/client.log".to_string()
}
