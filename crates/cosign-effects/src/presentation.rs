//! TCP presentation sink
//!
//! Opens a fresh connection per summary, writes one frame and closes.

use crate::transport::LineTransport;
use async_trait::async_trait;
use cosign_core::effects::PresentationEffects;
use cosign_core::{CosignError, Result};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Pushes summary frames to the presentation endpoint
#[derive(Debug, Clone)]
pub struct TcpPresentationHandler {
    addr: String,
    connect_timeout: Duration,
    transport: LineTransport,
}

impl TcpPresentationHandler {
    /// Create a sink for `addr`, a `host:port` resolved on every connect
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            transport: LineTransport {
                write_timeout: connect_timeout,
                ..LineTransport::default()
            },
        }
    }
}

#[async_trait]
impl PresentationEffects for TcpPresentationHandler {
    async fn deliver(&self, frame: String) -> Result<()> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(self.addr.as_str()))
            .await
            .map_err(|_| CosignError::timeout(format!("connect to {} timed out", self.addr)))?
            .map_err(|e| CosignError::network(format!("connect to {} failed: {e}", self.addr)))?;
        stream.set_nodelay(true)?;

        self.transport.write_line(&mut stream, &frame).await?;
        stream.shutdown().await?;
        tracing::debug!(addr = %self.addr, bytes = frame.len(), "summary delivered");
        Ok(())
    }
}
