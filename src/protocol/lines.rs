//! Newline framing with a per-line length cap.

use super::{decode, DecodeError};
use serde::de::DeserializeOwned;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Reads newline-delimited records from a byte stream.
///
/// A line longer than the limit is reported once as [`DecodeError::TooLong`]
/// and the rest of it is discarded up to the next newline, so the stream stays
/// in sync. A trailing fragment without a newline at end-of-stream is returned
/// as a final line.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            max_len,
        }
    }

    /// Next raw line. `Ok(None)` is end-of-stream; `Err` is a transport error.
    pub async fn next_line(&mut self) -> io::Result<Option<Result<String, DecodeError>>> {
        self.buf.clear();
        let limit = self.max_len as u64 + 1;
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        } else if self.buf.len() > self.max_len {
            self.discard_rest_of_line().await?;
            return Ok(Some(Err(DecodeError::TooLong {
                limit: self.max_len,
            })));
        }

        let line = std::mem::take(&mut self.buf);
        Ok(Some(
            String::from_utf8(line).map_err(|_| DecodeError::InvalidUtf8),
        ))
    }

    /// Next record decoded as `T`.
    pub async fn next_message<T: DeserializeOwned>(
        &mut self,
    ) -> io::Result<Option<Result<T, DecodeError>>> {
        Ok(self
            .next_line()
            .await?
            .map(|line| line.and_then(|l| decode::<T>(&l))))
    }

    async fn discard_rest_of_line(&mut self) -> io::Result<()> {
        let mut scratch = Vec::new();
        loop {
            scratch.clear();
            let n = (&mut self.inner)
                .take(self.max_len as u64)
                .read_until(b'\n', &mut scratch)
                .await?;
            if n == 0 || scratch.last() == Some(&b'\n') {
                return Ok(());
            }
        }
    }
}
