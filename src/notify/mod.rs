//! Attention notifier: asks the desktop to flag the window when new content
//! arrives that the user has not seen.
//!
//! Two states, `Idle` and `Flashing`. An alert is raised when content arrives
//! while the window is unfocused or the transcript is scrolled away from the
//! bottom, at most once per throttle window, and never while one is already
//! showing. It is cleared by any keystroke, or by catching up on the newest
//! entry while focused.
//!
//! Backend failures never reach the caller: the notifier disables itself.

pub mod backend;

use backend::{AttentionBackend, NoopBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierState {
    pub enabled: bool,
    pub is_flashing: bool,
    pub has_focus: bool,
    pub last_trigger: Option<Instant>,
}

pub struct Notifier {
    backend: Box<dyn AttentionBackend>,
    state: Mutex<NotifierState>,
    throttle: Duration,
}

impl Notifier {
    pub fn new(backend: Box<dyn AttentionBackend>, throttle: Duration) -> Self {
        let enabled = backend.is_supported();
        tracing::debug!(backend = backend.name(), enabled, "attention notifier ready");
        Self {
            backend,
            state: Mutex::new(NotifierState {
                enabled,
                is_flashing: false,
                has_focus: true,
                last_trigger: None,
            }),
            throttle,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NoopBackend), DEFAULT_THROTTLE)
    }

    fn lock(&self) -> MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> NotifierState {
        *self.lock()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Re-read focus from the backend.
    pub fn refresh_focus(&self) {
        if !self.lock().enabled {
            return;
        }
        if let Some(focused) = self.backend.query_focus() {
            self.set_focus(focused);
        }
    }

    /// Focus reported by the terminal itself.
    pub fn set_focus(&self, focused: bool) {
        let mut state = self.lock();
        if state.has_focus != focused {
            tracing::debug!(focused, "focus changed");
        }
        state.has_focus = focused;
    }

    /// New content arrived.
    pub fn maybe_flash(&self, at_bottom: bool) {
        self.maybe_flash_at(at_bottom, Instant::now());
    }

    /// Returns whether an alert was raised.
    fn maybe_flash_at(&self, at_bottom: bool, now: Instant) -> bool {
        if !self.lock().enabled {
            return false;
        }
        self.refresh_focus();
        {
            let mut state = self.lock();
            if !state.enabled || (state.has_focus && at_bottom) || state.is_flashing {
                return false;
            }
            if let Some(last) = state.last_trigger {
                if now.saturating_duration_since(last) < self.throttle {
                    tracing::debug!("alert throttled");
                    return false;
                }
            }
            state.is_flashing = true;
            state.last_trigger = Some(now);
        }

        if let Err(e) = self.backend.start_alert() {
            tracing::debug!(error = %e, "alert failed, disabling notifier");
            let mut state = self.lock();
            state.enabled = false;
            state.is_flashing = false;
            return false;
        }
        tracing::debug!(at_bottom, "alert raised");

        // A stop may have raced with the backend call.
        if !self.lock().is_flashing {
            self.backend.stop_alert();
        }
        true
    }

    /// The viewport moved or was re-rendered.
    pub fn on_history_change(&self, at_bottom: bool) {
        if !self.lock().enabled {
            return;
        }
        self.refresh_focus();
        if at_bottom && self.lock().has_focus {
            self.stop();
        }
    }

    /// Any keystroke clears the alert.
    pub fn notify_user_activity(&self) {
        self.stop();
    }

    fn stop(&self) {
        let was_flashing = {
            let mut state = self.lock();
            std::mem::replace(&mut state.is_flashing, false)
        };
        if was_flashing {
            tracing::debug!("alert cleared");
            self.backend.stop_alert();
        }
    }
}

/// Refresh focus every `interval` until `running` goes false.
pub fn spawn_focus_poll(
    notifier: Arc<Notifier>,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while running.load(Ordering::Acquire) {
            ticker.tick().await;
            if !notifier.state().enabled {
                break;
            }
            let notifier = Arc::clone(&notifier);
            if tokio::task::spawn_blocking(move || notifier.refresh_focus())
                .await
                .is_err()
            {
                break;
            }
        }
    })
}
