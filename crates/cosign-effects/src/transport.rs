//! Newline-delimited frame transport
//!
//! Stateless helpers over any tokio reader/writer. Every read and write is
//! bounded by a timeout and every read by a maximum frame length, so a peer
//! can neither stall a handler forever nor make it buffer without limit.

use cosign_core::{CosignError, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Frame transport settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTransport {
    /// Default read deadline
    pub read_timeout: Duration,
    /// Write deadline
    pub write_timeout: Duration,
    /// Largest accepted frame, excluding the newline
    pub max_frame_bytes: usize,
}

impl Default for LineTransport {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

impl LineTransport {
    /// Create with explicit limits
    pub fn new(read_timeout: Duration, write_timeout: Duration, max_frame_bytes: usize) -> Self {
        Self {
            read_timeout,
            write_timeout,
            max_frame_bytes,
        }
    }

    /// Read one frame using the default read deadline
    ///
    /// Returns `Ok(None)` when the peer closed the stream before sending
    /// anything.
    pub async fn read_line<R>(&self, reader: &mut R) -> Result<Option<String>>
    where
        R: AsyncBufRead + Unpin,
    {
        self.read_line_within(reader, self.read_timeout).await
    }

    /// Read one frame with an explicit deadline
    pub async fn read_line_within<R>(
        &self,
        reader: &mut R,
        deadline: Duration,
    ) -> Result<Option<String>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buffer = Vec::new();
        // one byte over the limit distinguishes "exactly max" from "too long"
        let limit = self.max_frame_bytes as u64 + 2;
        let bytes_read = timeout(
            deadline,
            (&mut *reader).take(limit).read_until(b'\n', &mut buffer),
        )
        .await
        .map_err(|_| CosignError::timeout("frame read timed out"))??;

        if bytes_read == 0 {
            return Ok(None);
        }

        let terminated = buffer.last() == Some(&b'\n');
        if terminated {
            buffer.pop();
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
        }
        if buffer.len() > self.max_frame_bytes {
            return Err(CosignError::invalid(format!(
                "frame exceeds {} bytes",
                self.max_frame_bytes
            )));
        }

        String::from_utf8(buffer)
            .map(Some)
            .map_err(|_| CosignError::invalid("frame is not UTF-8"))
    }

    /// Write one frame followed by a newline, then flush
    pub async fn write_line<W>(&self, writer: &mut W, frame: &str) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut bytes = Vec::with_capacity(frame.len() + 1);
        bytes.extend_from_slice(frame.as_bytes());
        bytes.push(b'\n');

        timeout(self.write_timeout, async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| CosignError::timeout("frame write timed out"))??;
        Ok(())
    }
}
