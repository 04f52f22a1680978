//! Diagnostic logging setup.
//!
//! The relay writes to stderr. The client owns the terminal, so its records
//! go to a file, and when that file cannot be opened logging is simply off.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const NOTIFY_TARGET: &str = "crabrelay::notify";

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::INFO)
}

fn build_targets(level: LevelFilter, debug_notify: bool) -> Targets {
    let targets = Targets::new().with_default(level);
    if debug_notify && level < LevelFilter::DEBUG {
        targets.with_target(NOTIFY_TARGET, LevelFilter::DEBUG)
    } else {
        targets
    }
}

/// Server logging. `verbose` forces DEBUG regardless of the configured level.
pub fn init_stderr(level: &str, verbose: bool) -> Result<(), InitError> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        parse_level(level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr),
        )
        .with(build_targets(level, false))
        .try_init()
        .map_err(|err| InitError::Configure(err.to_string()))
}

/// Client logging into `path`, with the notifier turned up to DEBUG when
/// `debug_notify` is set.
pub fn init_file(path: &Path, level: &str, debug_notify: bool) -> Result<(), InitError> {
    let file = open_log_file(path)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .with(build_targets(parse_level(level), debug_notify))
        .try_init()
        .map_err(|err| InitError::Configure(err.to_string()))
}

fn open_log_file(path: &Path) -> Result<fs::File, InitError> {
    let io_err = |source| InitError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)
}
