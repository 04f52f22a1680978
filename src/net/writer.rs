use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// How long `close` waits for an in-flight send before giving up on a clean
/// shutdown.
pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Write half of a stream that several tasks may send on and any of them may
/// close.
///
/// Each `send` writes one whole line under the writer lock, so concurrent
/// senders never interleave bytes. `close` shuts the stream down at most once;
/// a send after close fails with `NotConnected`. A send stuck on a peer that
/// stopped reading keeps the lock, so `close` gives up on the shutdown after
/// [`CLOSE_GRACE`] and leaves the stream to be dropped with its owner.
pub struct SharedWriter {
    inner: Mutex<Option<BoxedWrite>>,
    closed: AtomicBool,
    closed_notify: Notify,
}

impl SharedWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Mutex::new(Some(Box::new(writer))),
            closed: AtomicBool::new(false),
            closed_notify: Notify::new(),
        }
    }

    pub async fn send(&self, line: &[u8]) -> io::Result<()> {
        let mut guard = self.inner.lock().await;
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream closed"));
        }
        let writer = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream closed"))?;
        writer.write_all(line).await?;
        writer.flush().await
    }

    /// Shut the stream down. Returns `true` for the call that actually closed it.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.closed_notify.notify_waiters();
        let writer = match tokio::time::timeout(CLOSE_GRACE, self.inner.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                tracing::debug!("send still in flight, skipping shutdown");
                None
            }
        };
        if let Some(mut writer) = writer {
            match tokio::time::timeout(CLOSE_GRACE, writer.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "shutdown after close failed"),
                Err(_) => tracing::debug!("shutdown timed out"),
            }
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once `close` has been called, by anyone.
    pub async fn closed(&self) {
        let notified = self.closed_notify.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}
