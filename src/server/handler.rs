//! Per-connection state machine: `AwaitingJoin -> Joined -> Terminated`.
//!
//! A handler is the only code that registers or deregisters its own
//! connection, and the only code that announces its departure.

use crate::net::SharedWriter;
use crate::protocol::{ClientMessage, LineReader, ServerMessage, MAX_LINE_LEN};
use crate::server::registry::{ConnId, Peer, Registry, RegistryError};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};

/// Why the joined loop ended.
#[derive(Debug)]
enum LoopEnd {
    Leave,
    Eof,
    ReadError(io::Error),
    /// The dispatcher dropped this peer after a failed write.
    Dropped,
}

struct Session {
    conn: ConnId,
    addr: SocketAddr,
    registry: Arc<Registry>,
    writer: Arc<SharedWriter>,
}

/// Drive one accepted connection to completion.
pub async fn handle_connection<S>(
    stream: S,
    conn: ConnId,
    addr: SocketAddr,
    registry: Arc<Registry>,
) -> Result<(), RegistryError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = LineReader::new(read_half, MAX_LINE_LEN);
    let session = Session {
        conn,
        addr,
        registry,
        writer: Arc::new(SharedWriter::new(write_half)),
    };

    // AwaitingJoin
    let Some(name) = await_join(&mut reader, addr).await else {
        tracing::debug!(conn, peer = %addr, "no valid join, closing");
        session.writer.close().await;
        return Ok(());
    };

    let peer = Peer {
        conn,
        name: name.clone(),
        addr,
        writer: Arc::clone(&session.writer),
    };
    if let Err(e) = session.registry.register(peer) {
        session.writer.close().await;
        return Err(e);
    }
    tracing::info!(conn, peer = %addr, %name, "joined");
    session
        .registry
        .broadcast(&ServerMessage::system(format!("{name} joined")), None)
        .await;

    // Joined
    let end = session.message_loop(&mut reader, &name).await;
    match &end {
        LoopEnd::ReadError(e) => {
            tracing::info!(conn, %name, error = %e, "read failed")
        }
        other => tracing::info!(conn, %name, reason = ?other, "left"),
    }

    // Terminated
    session.terminate(&name).await;
    Ok(())
}

/// Read the first record and derive the effective display name.
async fn await_join<R>(reader: &mut LineReader<R>, addr: SocketAddr) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    match reader.next_message::<ClientMessage>().await {
        Ok(Some(Ok(ClientMessage::Join { name }))) => Some(effective_name(&name, addr)),
        Ok(Some(Ok(other))) => {
            tracing::debug!(peer = %addr, first = ?other, "first record was not a join");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::debug!(peer = %addr, error = %e, "undecodable join");
            None
        }
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(peer = %addr, error = %e, "read failed before join");
            None
        }
    }
}

/// Trimmed name, or `ip:port` when nothing usable was supplied.
pub fn effective_name(requested: &str, addr: SocketAddr) -> String {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        format!("{}:{}", addr.ip(), addr.port())
    } else {
        trimmed.to_string()
    }
}

impl Session {
    async fn message_loop<S>(&self, reader: &mut LineReader<ReadHalf<S>>, name: &str) -> LoopEnd
    where
        S: AsyncRead + AsyncWrite,
    {
        loop {
            let next = tokio::select! {
                next = reader.next_message::<ClientMessage>() => next,
                _ = self.writer.closed() => return LoopEnd::Dropped,
            };
            let msg = match next {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(e))) => {
                    tracing::debug!(conn = self.conn, error = %e, "skipping undecodable line");
                    continue;
                }
                Ok(None) => return LoopEnd::Eof,
                Err(e) => return LoopEnd::ReadError(e),
            };

            match msg {
                ClientMessage::Chat { text } => {
                    self.registry
                        .broadcast(&ServerMessage::chat(name, text), None)
                        .await;
                }
                ClientMessage::List => {
                    let users = self
                        .registry
                        .snapshot()
                        .into_iter()
                        .map(|p| p.name)
                        .collect();
                    self.registry
                        .send_to(self.conn, &ServerMessage::roster(users))
                        .await;
                }
                ClientMessage::Leave => return LoopEnd::Leave,
                ClientMessage::Join { .. } => {
                    tracing::debug!(conn = self.conn, "ignoring repeated join");
                }
            }
        }
    }

    async fn terminate(&self, name: &str) {
        self.registry.deregister(self.conn);
        self.writer.close().await;
        tracing::debug!(conn = self.conn, peer = %self.addr, "connection closed");
        self.registry
            .broadcast(&ServerMessage::system(format!("{name} left")), Some(self.conn))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::writer::test_support::FailingWriter;
    use crate::protocol::{decode, encode};
    use std::sync::atomic::Ordering;
    use tokio::io::{AsyncWriteExt, DuplexStream, WriteHalf};
    use tokio::task::JoinHandle;

    struct TestClient {
        reader: LineReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
        task: JoinHandle<Result<(), RegistryError>>,
    }

    impl TestClient {
        fn connect(registry: &Arc<Registry>, conn: ConnId) -> Self {
            let (client_side, server_side) = tokio::io::duplex(16 * 1024);
            let addr = SocketAddr::from(([10, 0, 0, 1], 50000 + conn as u16));
            let task = tokio::spawn(handle_connection(
                server_side,
                conn,
                addr,
                Arc::clone(registry),
            ));
            let (read_half, writer) = tokio::io::split(client_side);
            Self {
                reader: LineReader::new(read_half, MAX_LINE_LEN),
                writer,
                task,
            }
        }

        async fn send(&mut self, msg: &ClientMessage) {
            self.send_raw(&encode(msg).unwrap()).await;
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> ServerMessage {
            let line = self.reader.next_line().await.unwrap().unwrap().unwrap();
            decode(&line).unwrap()
        }

        async fn expect_system(&mut self, expected: &str) {
            match self.recv().await {
                ServerMessage::System { text, ts } => {
                    assert_eq!(text, expected);
                    assert!(!ts.is_empty());
                }
                other => panic!("expected system {expected:?}, got {other:?}"),
            }
        }

        async fn join(registry: &Arc<Registry>, conn: ConnId, name: &str) -> Self {
            let mut client = Self::connect(registry, conn);
            client
                .send(&ClientMessage::Join { name: name.into() })
                .await;
            client.expect_system(&format!("{name} joined")).await;
            client
        }
    }

    async fn three_peers(registry: &Arc<Registry>) -> (TestClient, TestClient, TestClient) {
        let mut a = TestClient::join(registry, 1, "A").await;
        let mut b = TestClient::join(registry, 2, "B").await;
        a.expect_system("B joined").await;
        let c = TestClient::join(registry, 3, "C").await;
        a.expect_system("C joined").await;
        b.expect_system("C joined").await;
        (a, b, c)
    }

    #[test]
    fn test_effective_name() {
        let addr = SocketAddr::from(([192, 168, 0, 9], 6000));
        assert_eq!(effective_name("  alice \t", addr), "alice");
        assert_eq!(effective_name("   ", addr), "192.168.0.9:6000");
        assert_eq!(effective_name("", addr), "192.168.0.9:6000");
    }

    #[tokio::test]
    async fn test_chat_reaches_every_peer_including_sender() {
        let registry = Arc::new(Registry::new());
        let (mut a, mut b, mut c) = three_peers(&registry).await;

        a.send(&ClientMessage::Chat { text: "hi".into() }).await;
        for client in [&mut a, &mut b, &mut c] {
            match client.recv().await {
                ServerMessage::Chat { name, text, ts } => {
                    assert_eq!(name, "A");
                    assert_eq!(text, "hi");
                    assert!(!ts.is_empty());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_roster_goes_only_to_requester() {
        let registry = Arc::new(Registry::new());
        let (mut a, mut b, mut c) = three_peers(&registry).await;

        c.send(&ClientMessage::List).await;
        match c.recv().await {
            ServerMessage::Roster { users, .. } => assert_eq!(users, ["A", "B", "C"]),
            other => panic!("unexpected {other:?}"),
        }

        a.send(&ClientMessage::Chat {
            text: "after".into(),
        })
        .await;
        for client in [&mut a, &mut b] {
            assert!(matches!(
                client.recv().await,
                ServerMessage::Chat { text, .. } if text == "after"
            ));
        }
    }

    #[tokio::test]
    async fn test_leave_announces_to_remaining_peers() {
        let registry = Arc::new(Registry::new());
        let (mut a, mut b, mut c) = three_peers(&registry).await;

        b.send(&ClientMessage::Leave).await;
        a.expect_system("B left").await;
        c.expect_system("B left").await;
        assert!(b.reader.next_line().await.unwrap().is_none());
        b.task.await.unwrap().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_vanished_peer_is_dropped_and_announced() {
        let registry = Arc::new(Registry::new());
        let (mut a, b, mut c) = three_peers(&registry).await;

        let TestClient {
            reader,
            writer,
            task,
        } = b;
        drop(reader);
        drop(writer);

        task.await.unwrap().unwrap();
        assert_eq!(registry.len(), 2);
        a.expect_system("B left").await;
        c.expect_system("B left").await;

        a.send(&ClientMessage::Chat { text: "again".into() }).await;
        assert!(matches!(a.recv().await, ServerMessage::Chat { text, .. } if text == "again"));
        assert!(matches!(c.recv().await, ServerMessage::Chat { text, .. } if text == "again"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_write_failure_ends_handler_and_announces_departure() {
        let registry = Arc::new(Registry::new());
        let mut a = TestClient::join(&registry, 1, "A").await;

        // B's reads stay open; only its writes fail.
        let (mut b_input, b_server_read) = tokio::io::duplex(1024);
        let (failing, shutdowns) = FailingWriter::new();
        let b_task = tokio::spawn(handle_connection(
            tokio::io::join(b_server_read, failing),
            2,
            SocketAddr::from(([10, 0, 0, 2], 50002)),
            Arc::clone(&registry),
        ));
        b_input
            .write_all(encode(&ClientMessage::Join { name: "B".into() }).unwrap().as_bytes())
            .await
            .unwrap();

        a.expect_system("B joined").await;
        a.expect_system("B left").await;
        b_task.await.unwrap().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        a.send(&ClientMessage::Chat { text: "alone".into() }).await;
        assert!(matches!(a.recv().await, ServerMessage::Chat { text, .. } if text == "alone"));
        assert_eq!(registry.len(), 1);
        drop(b_input);
    }

    #[tokio::test]
    async fn test_first_record_must_be_join() {
        let registry = Arc::new(Registry::new());
        let mut client = TestClient::connect(&registry, 1);
        client.send(&ClientMessage::Chat { text: "hi".into() }).await;
        assert!(client.reader.next_line().await.unwrap().is_none());
        client.task.await.unwrap().unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_falls_back_to_address() {
        let registry = Arc::new(Registry::new());
        let mut client = TestClient::connect(&registry, 4);
        client.send(&ClientMessage::Join { name: "  ".into() }).await;
        client.expect_system("10.0.0.1:50004 joined").await;
        assert_eq!(registry.snapshot()[0].name, "10.0.0.1:50004");
    }

    #[tokio::test]
    async fn test_garbage_lines_are_skipped() {
        let registry = Arc::new(Registry::new());
        let mut a = TestClient::join(&registry, 1, "A").await;
        a.send_raw("this is not json\n").await;
        a.send_raw("{\"type\":\"warp\"}\n").await;
        a.send(&ClientMessage::Chat { text: "still here".into() }).await;
        assert!(matches!(
            a.recv().await,
            ServerMessage::Chat { text, .. } if text == "still here"
        ));
        assert_eq!(registry.len(), 1);
    }
}
