//! Live session registry and broadcast dispatcher.
//!
//! The registry is the only cross-connection state in the relay. It maps a
//! connection id to the joined peer's name, address and writer, in join order,
//! behind one mutex. The mutex is never held across a write: a broadcast
//! copies the target handles under the lock and delivers after releasing it.
//!
//! A delivery failure drops that peer (deregister + close, once). The
//! dispatcher never announces the departure itself; the peer's own connection
//! handler does that when its read loop ends.

use crate::net::SharedWriter;
use crate::protocol::{encode, ServerMessage};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

pub type ConnId = u64;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnId),
}

#[derive(Clone)]
pub struct Peer {
    pub conn: ConnId,
    pub name: String,
    pub addr: SocketAddr,
    pub writer: Arc<SharedWriter>,
}

/// Read-only copy of a registered peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub conn: ConnId,
    pub name: String,
    pub addr: SocketAddr,
}

#[derive(Default)]
pub struct Registry {
    peers: Mutex<Vec<Peer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Peer>> {
        self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, peer: Peer) -> Result<(), RegistryError> {
        let mut peers = self.lock();
        if peers.iter().any(|p| p.conn == peer.conn) {
            return Err(RegistryError::AlreadyRegistered(peer.conn));
        }
        peers.push(peer);
        Ok(())
    }

    /// Remove `conn` if present. Idempotent.
    pub fn deregister(&self, conn: ConnId) -> Option<Peer> {
        let mut peers = self.lock();
        let idx = peers.iter().position(|p| p.conn == conn)?;
        Some(peers.remove(idx))
    }

    /// Current peers in join order.
    pub fn snapshot(&self) -> Vec<PeerInfo> {
        self.lock()
            .iter()
            .map(|p| PeerInfo {
                conn: p.conn,
                name: p.name.clone(),
                addr: p.addr,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `msg` to every registered peer except `exclude`.
    ///
    /// Returns how many peers it reached.
    pub async fn broadcast(&self, msg: &ServerMessage, exclude: Option<ConnId>) -> usize {
        let line = match encode(msg) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast");
                return 0;
            }
        };
        let targets: Vec<(ConnId, Arc<SharedWriter>)> = self
            .lock()
            .iter()
            .filter(|p| Some(p.conn) != exclude)
            .map(|p| (p.conn, Arc::clone(&p.writer)))
            .collect();

        let mut delivered = 0;
        for (conn, writer) in targets {
            match writer.send(line.as_bytes()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::info!(conn, error = %e, "delivery failed, dropping peer");
                    self.drop_peer(conn, &writer).await;
                }
            }
        }
        delivered
    }

    /// Deliver `msg` to one registered peer. `false` if it is gone or the
    /// write failed (in which case it has been dropped).
    pub async fn send_to(&self, conn: ConnId, msg: &ServerMessage) -> bool {
        let line = match encode(msg) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode reply");
                return false;
            }
        };
        let writer = self
            .lock()
            .iter()
            .find(|p| p.conn == conn)
            .map(|p| Arc::clone(&p.writer));
        let Some(writer) = writer else {
            return false;
        };
        match writer.send(line.as_bytes()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(conn, error = %e, "reply failed, dropping peer");
                self.drop_peer(conn, &writer).await;
                false
            }
        }
    }

    /// Deregister and close every peer (server shutdown).
    pub async fn close_all(&self) {
        let peers: Vec<Peer> = std::mem::take(&mut *self.lock());
        for peer in peers {
            peer.writer.close().await;
        }
    }

    async fn drop_peer(&self, conn: ConnId, writer: &SharedWriter) {
        self.deregister(conn);
        writer.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::writer::test_support::FailingWriter;
    use crate::protocol::{decode, LineReader, MAX_LINE_LEN};
    use std::sync::atomic::Ordering;
    use tokio::io::DuplexStream;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn duplex_peer(conn: ConnId, name: &str) -> (Peer, LineReader<DuplexStream>) {
        let (local, remote) = tokio::io::duplex(4096);
        let peer = Peer {
            conn,
            name: name.to_string(),
            addr: addr(40000 + conn as u16),
            writer: Arc::new(SharedWriter::new(local)),
        };
        (peer, LineReader::new(remote, MAX_LINE_LEN))
    }

    async fn recv(reader: &mut LineReader<DuplexStream>) -> ServerMessage {
        let line = reader.next_line().await.unwrap().unwrap().unwrap();
        decode(&line).unwrap()
    }

    #[test]
    fn test_register_rejects_duplicate_and_deregister_is_idempotent() {
        let registry = Registry::new();
        let (a, _ra) = duplex_peer(1, "A");
        registry.register(a.clone()).unwrap();
        assert!(matches!(
            registry.register(a),
            Err(RegistryError::AlreadyRegistered(1))
        ));
        assert!(registry.deregister(1).is_some());
        assert!(registry.deregister(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_keeps_join_order() {
        let registry = Registry::new();
        let mut readers = Vec::new();
        for (conn, name) in [(7, "A"), (3, "B"), (5, "C")] {
            let (peer, reader) = duplex_peer(conn, name);
            registry.register(peer).unwrap();
            readers.push(reader);
        }
        let names: Vec<_> = registry.snapshot().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_broadcast_honors_exclusion() {
        let registry = Registry::new();
        let (a, mut ra) = duplex_peer(1, "A");
        let (b, mut rb) = duplex_peer(2, "B");
        registry.register(a).unwrap();
        registry.register(b).unwrap();

        let n = registry
            .broadcast(&ServerMessage::system("A left"), Some(1))
            .await;
        assert_eq!(n, 1);
        assert!(matches!(recv(&mut rb).await, ServerMessage::System { text, .. } if text == "A left"));

        registry.broadcast(&ServerMessage::system("ping"), None).await;
        assert!(matches!(recv(&mut ra).await, ServerMessage::System { text, .. } if text == "ping"));
    }

    #[tokio::test]
    async fn test_failed_delivery_drops_peer_and_closes_once() {
        let registry = Registry::new();
        let (a, mut ra) = duplex_peer(1, "A");
        let (failing, shutdowns) = FailingWriter::new();
        let b = Peer {
            conn: 2,
            name: "B".into(),
            addr: addr(40002),
            writer: Arc::new(SharedWriter::new(failing)),
        };
        let (c, mut rc) = duplex_peer(3, "C");
        registry.register(a).unwrap();
        registry.register(b).unwrap();
        registry.register(c).unwrap();

        let n = registry.broadcast(&ServerMessage::chat("A", "one"), None).await;
        assert_eq!(n, 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        let n = registry.broadcast(&ServerMessage::chat("A", "two"), None).await;
        assert_eq!(n, 2);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        for reader in [&mut ra, &mut rc] {
            assert!(matches!(recv(reader).await, ServerMessage::Chat { text, .. } if text == "one"));
            assert!(matches!(recv(reader).await, ServerMessage::Chat { text, .. } if text == "two"));
        }
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let registry = Registry::new();
        assert!(!registry.send_to(9, &ServerMessage::roster(vec![])).await);
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let registry = Registry::new();
        let (a, mut ra) = duplex_peer(1, "A");
        let writer = Arc::clone(&a.writer);
        registry.register(a).unwrap();
        registry.close_all().await;
        assert!(registry.is_empty());
        assert!(writer.is_closed());
        assert!(ra.next_line().await.unwrap().is_none());
    }
}
