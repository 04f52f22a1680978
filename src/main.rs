mod app;
mod cli;
mod client;
mod config;
mod history;
mod logging;
mod net;
mod notify;
mod protocol;
mod server;
mod ui;

use crate::cli::{Cli, Command, ConnectArgs};
use crate::client::SessionEnd;
use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    match cli.command {
        Command::Serve(args) => {
            if let Err(e) = logging::init_stderr(&cfg.logging.level, args.verbose) {
                eprintln!("warning: {e}");
            }
            server::run(&args).await
        }
        Command::Connect(args) => run_client(args, cfg).await,
    }
}

async fn run_client(args: ConnectArgs, cfg: config::AppConfig) -> Result<()> {
    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| cfg.logging.file_path());
    if let Err(e) = logging::init_file(&log_path, &cfg.logging.level, args.debug_notify) {
        eprintln!("note: logging disabled: {e}");
    }

    let session = match client::connect(&args, &cfg).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "connect failed");
            client::report_error(&e);
            std::process::exit(1);
        }
    };

    // Install panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        original_hook(info);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = session.run_ui(&mut terminal).await;

    // Restore terminal
    restore_terminal()?;

    match result {
        Ok(SessionEnd::Left) => Ok(()),
        Ok(SessionEnd::Disconnected) => {
            eprintln!("{}", client::receive::DISCONNECTED_TEXT);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(
        io::stdout(),
        DisableFocusChange,
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    Ok(())
}
