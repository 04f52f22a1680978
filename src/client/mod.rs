//! Terminal chat client.
//!
//! [`connect`] dials the relay and sends the join before any terminal setup,
//! so connection errors print as ordinary messages. [`Session::run_ui`] then
//! drives the event loop until the user leaves or the relay goes away.

pub mod receive;

use crate::app::action::Action;
use crate::app::event::AppEvent;
use crate::app::handler;
use crate::app::state::AppState;
use crate::cli::ConnectArgs;
use crate::config::nickname::generate_nickname;
use crate::config::AppConfig;
use crate::history::ChatHistory;
use crate::net::tls::{self, ClientTrust};
use crate::net::SharedWriter;
use crate::notify::{self, backend, Notifier};
use crate::protocol::{encode, ClientMessage};
use crate::ui;
use anyhow::Result;
use crossterm::event::EventStream;
use futures::StreamExt;
use ratatui::prelude::*;
use receive::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const INSECURE_WARNING: &str =
    "warning: --insecure disables certificate verification; anyone on the path can read and alter this session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Left,
    Disconnected,
}

pub struct Session {
    state: AppState,
    writer: Arc<SharedWriter>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

fn display_name(requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_nickname)
}

pub async fn connect(args: &ConnectArgs, cfg: &AppConfig) -> Result<Session> {
    let trust = args.trust()?;
    let insecure = matches!(trust, ClientTrust::Insecure);
    if insecure {
        eprintln!("{INSECURE_WARNING}");
        tracing::warn!("certificate verification disabled");
    }

    let stream = tls::connect(&args.host, args.port, &trust).await?;
    tracing::info!(host = %args.host, port = args.port, "connected");
    let (reader, writer) = tokio::io::split(stream);
    let writer = Arc::new(SharedWriter::new(writer));

    let name = display_name(args.name.as_deref());
    let join = encode(&ClientMessage::Join { name: name.clone() })?;
    writer.send(join.as_bytes()).await?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let redraw_tx = event_tx.clone();
    let history = Arc::new(
        ChatHistory::new(cfg.history.max_entries).with_on_change(move || {
            let _ = redraw_tx.send(AppEvent::Redraw);
        }),
    );
    let notifier = Arc::new(Notifier::new(
        backend::select_backend(cfg.notifier.enabled),
        cfg.notifier.throttle(),
    ));
    tracing::debug!(backend = notifier.backend_name(), "attention backend selected");
    let running = Arc::new(AtomicBool::new(true));

    let receiver = Receiver {
        history: Arc::clone(&history),
        notifier: Arc::clone(&notifier),
        events: event_tx.clone(),
        running: Arc::clone(&running),
    };
    let mut tasks = vec![tokio::spawn(receiver.run(reader))];
    if notifier.state().enabled {
        tasks.push(notify::spawn_focus_poll(
            Arc::clone(&notifier),
            cfg.notifier.poll_interval(),
            Arc::clone(&running),
        ));
    }

    let mut state = AppState::new(
        name.clone(),
        format!("{}:{}", args.host, args.port),
        history,
        notifier,
    );
    state.insecure = insecure;
    state.mouse_scroll_lines = cfg.history.mouse_scroll_lines;
    state.system_message(format!("Connected to {}:{} as {}", args.host, args.port, name));
    state.system_message("Type /exit to leave.");

    Ok(Session {
        state,
        writer,
        event_tx,
        event_rx,
        running,
        tasks,
    })
}

impl Session {
    pub async fn run_ui<B: Backend>(mut self, terminal: &mut Terminal<B>) -> Result<SessionEnd> {
        // Spawn terminal input task
        let term_tx = self.event_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut reader = EventStream::new();
            while let Some(Ok(event)) = reader.next().await {
                if term_tx.send(AppEvent::Terminal(event)).is_err() {
                    break;
                }
            }
        }));

        terminal.draw(|f| ui::render(f, &self.state))?;

        let result = self.event_loop(terminal).await;
        self.shutdown().await;
        result
    }

    async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<SessionEnd> {
        while let Some(event) = self.event_rx.recv().await {
            let actions = handler::handle_event(&mut self.state, event);
            for action in actions {
                self.dispatch(action).await;
            }

            if self.state.should_quit {
                break;
            }
            if self.state.dirty {
                terminal.draw(|f| ui::render(f, &self.state))?;
                self.state.dirty = false;
            }
        }
        Ok(if self.state.connected {
            SessionEnd::Left
        } else {
            SessionEnd::Disconnected
        })
    }

    async fn dispatch(&mut self, action: Action) {
        match action {
            Action::Send(msg) => self.send(msg).await,
            Action::UserActivity => {
                if self.state.notifier.state().is_flashing {
                    let notifier = Arc::clone(&self.state.notifier);
                    let _ = tokio::task::spawn_blocking(move || notifier.notify_user_activity());
                }
            }
            Action::HistoryChanged => {
                let notifier = Arc::clone(&self.state.notifier);
                if notifier.state().is_flashing {
                    let at_bottom = self.state.history.is_at_bottom();
                    let _ = tokio::task::spawn_blocking(move || notifier.on_history_change(at_bottom));
                }
            }
            Action::Quit => self.state.should_quit = true,
        }
    }

    async fn send(&mut self, msg: ClientMessage) {
        let leaving = msg == ClientMessage::Leave;
        let line = match encode(&msg) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "cannot encode outgoing record");
                return;
            }
        };
        if let Err(e) = self.writer.send(line.as_bytes()).await {
            tracing::warn!(error = %e, "send failed");
            if !leaving {
                self.state.system_message(format!("Send failed: {e}"));
            }
        }
    }

    async fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        self.writer.close().await;

        let notifier = Arc::clone(&self.state.notifier);
        if notifier.state().is_flashing {
            let _ = tokio::task::spawn_blocking(move || notifier.notify_user_activity()).await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Print a connection failure and its remediation hint.
pub fn report_error(err: &anyhow::Error) {
    eprintln!("Error: {err}");
    if let Some(hint) = err
        .downcast_ref::<tls::ConnectError>()
        .and_then(tls::ConnectError::hint)
    {
        eprintln!("Hint: {hint}");
    }
}
