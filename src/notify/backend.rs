//! Host-level attention primitives.
//!
//! Call sites only see [`AttentionBackend`]; which implementation is behind it
//! is decided once at startup by [`select_backend`].

use std::io;
use std::process::{Command, Stdio};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Status {
        program: &'static str,
        status: std::process::ExitStatus,
    },
}

pub trait AttentionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether alerts can be raised at all. `false` disables the notifier.
    fn is_supported(&self) -> bool {
        true
    }

    /// Focus of the window hosting this terminal. `None` when unknown.
    fn query_focus(&self) -> Option<bool>;

    fn start_alert(&self) -> Result<(), BackendError>;

    fn stop_alert(&self);
}

/// Used when the platform offers nothing, or alerts are turned off.
pub struct NoopBackend;

impl AttentionBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_supported(&self) -> bool {
        false
    }

    fn query_focus(&self) -> Option<bool> {
        None
    }

    fn start_alert(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn stop_alert(&self) {}
}

/// X11 window-manager urgency via `wmctrl`, focus via `xdotool`.
///
/// Needs `DISPLAY` and the terminal emulator's `WINDOWID`.
pub struct X11Backend {
    window_id: u64,
}

impl X11Backend {
    pub fn detect() -> Option<Self> {
        std::env::var_os("DISPLAY")?;
        let window_id = std::env::var("WINDOWID").ok()?.trim().parse().ok()?;
        let backend = Self { window_id };
        match run("wmctrl", &["-m"]) {
            Ok(_) => Some(backend),
            Err(e) => {
                tracing::debug!(error = %e, "wmctrl unavailable");
                None
            }
        }
    }

    fn set_demands_attention(&self, on: bool) -> Result<(), BackendError> {
        let action = if on {
            "add,demands_attention"
        } else {
            "remove,demands_attention"
        };
        let id = format!("{:#x}", self.window_id);
        run("wmctrl", &["-i", "-r", &id, "-b", action]).map(|_| ())
    }
}

impl AttentionBackend for X11Backend {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn query_focus(&self) -> Option<bool> {
        match run("xdotool", &["getactivewindow"]) {
            Ok(out) => out.trim().parse::<u64>().ok().map(|id| id == self.window_id),
            Err(e) => {
                tracing::debug!(error = %e, "focus query failed");
                None
            }
        }
    }

    fn start_alert(&self) -> Result<(), BackendError> {
        self.set_demands_attention(true)
    }

    fn stop_alert(&self) {
        if let Err(e) = self.set_demands_attention(false) {
            tracing::debug!(error = %e, "clearing urgency failed");
        }
    }
}

fn run(program: &'static str, args: &[&str]) -> Result<String, BackendError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|source| BackendError::Spawn { program, source })?;
    if !output.status.success() {
        return Err(BackendError::Status {
            program,
            status: output.status,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pick the backend once for the whole session.
pub fn select_backend(enabled: bool) -> Box<dyn AttentionBackend> {
    if !enabled {
        return Box::new(NoopBackend);
    }
    match X11Backend::detect() {
        Some(backend) => Box::new(backend),
        None => Box::new(NoopBackend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_is_unsupported_and_harmless() {
        let backend = NoopBackend;
        assert!(!backend.is_supported());
        assert_eq!(backend.query_focus(), None);
        assert!(backend.start_alert().is_ok());
        backend.stop_alert();
    }

    #[test]
    fn test_disabled_selection_is_noop() {
        assert_eq!(select_backend(false).name(), "none");
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let err = run("crabrelay-no-such-program", &[]).unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }
}
