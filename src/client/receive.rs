//! Receive loop: relay records into transcript entries.

use crate::app::event::AppEvent;
use crate::app::state::SYSTEM_AUTHOR;
use crate::history::{ChatEntry, ChatHistory};
use crate::notify::Notifier;
use crate::protocol::{timestamp_now, LineReader, ServerMessage, MAX_LINE_LEN};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;

pub const DISCONNECTED_TEXT: &str = "Disconnected from server.";

pub struct Receiver {
    pub history: Arc<ChatHistory>,
    pub notifier: Arc<Notifier>,
    pub events: UnboundedSender<AppEvent>,
    pub running: Arc<AtomicBool>,
}

impl Receiver {
    /// Runs until the relay closes the stream or the read fails.
    pub async fn run<R: AsyncRead + Unpin>(self, reader: R) {
        let mut lines = LineReader::new(reader, MAX_LINE_LEN);
        loop {
            match lines.next_message::<ServerMessage>().await {
                Ok(Some(Ok(msg))) => {
                    self.history.append(entry_for(msg));
                    self.alert().await;
                }
                Ok(Some(Err(e))) => tracing::debug!(error = %e, "skipping malformed record"),
                Ok(None) => {
                    tracing::info!("relay closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "read from relay failed");
                    break;
                }
            }
        }

        self.history
            .append(ChatEntry::new(SYSTEM_AUTHOR, DISCONNECTED_TEXT, timestamp_now()));
        if self.running.swap(false, Ordering::AcqRel) {
            let _ = self.events.send(AppEvent::Disconnected);
        }
    }

    async fn alert(&self) {
        if !self.notifier.state().enabled {
            return;
        }
        let at_bottom = self.history.is_at_bottom();
        let notifier = Arc::clone(&self.notifier);
        if let Err(e) = tokio::task::spawn_blocking(move || notifier.maybe_flash(at_bottom)).await {
            tracing::debug!(error = %e, "alert task failed");
        }
    }
}

fn stamp_or_now(ts: String) -> String {
    if ts.trim().is_empty() {
        timestamp_now()
    } else {
        ts
    }
}

pub fn entry_for(msg: ServerMessage) -> ChatEntry {
    match msg {
        ServerMessage::Chat { name, text, ts } => ChatEntry::new(name, text, stamp_or_now(ts)),
        ServerMessage::System { text, ts } => {
            ChatEntry::new(SYSTEM_AUTHOR, text, stamp_or_now(ts))
        }
        ServerMessage::Roster { users, ts } => ChatEntry::new(
            SYSTEM_AUTHOR,
            format!("Online ({}): {}", users.len(), users.join(", ")),
            stamp_or_now(ts),
        ),
    }
}
