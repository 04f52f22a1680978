//! The broadcast relay: TLS accept loop plus one task per connection.
//!
//! There is no admission limit. Every accepted connection gets its own task
//! for as long as the peer keeps it open, so an unthrottled client can open
//! connections until the process runs out of descriptors.
//!
//! On Ctrl-C every peer is closed. A peer that stopped reading holds its
//! writer mid-send, so each such peer delays shutdown by up to
//! [`CLOSE_GRACE`](crate::net::writer::CLOSE_GRACE).

pub mod handler;
pub mod registry;

use crate::cli::ServeArgs;
use crate::net::tls;
use anyhow::{Context, Result};
use registry::{ConnId, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub async fn run(args: &ServeArgs) -> Result<()> {
    let acceptor = tls::build_acceptor(&args.cert, &args.key)?;
    let listener = TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", args.host, args.port))?;
    tracing::info!(addr = %listener.local_addr()?, "relay listening");

    let registry = Arc::new(Registry::new());
    tokio::select! {
        _ = accept_loop(listener, acceptor, Arc::clone(&registry)) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            tracing::info!("shutting down");
        }
    }

    let remaining = registry.len();
    registry.close_all().await;
    tracing::info!(closed = remaining, "relay stopped");
    Ok(())
}

async fn accept_loop(listener: TcpListener, acceptor: TlsAcceptor, registry: Arc<Registry>) {
    let mut next_conn: ConnId = 0;
    loop {
        let (tcp, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        next_conn += 1;
        let conn = next_conn;
        let acceptor = acceptor.clone();
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            match acceptor.accept(tcp).await {
                Ok(stream) => {
                    tracing::debug!(conn, peer = %addr, "tls established");
                    if let Err(e) = handler::handle_connection(stream, conn, addr, registry).await {
                        tracing::error!(conn, peer = %addr, error = %e, "connection aborted");
                    }
                }
                Err(e) => tracing::warn!(peer = %addr, error = %e, "TLS handshake failed"),
            }
        });
    }
}
