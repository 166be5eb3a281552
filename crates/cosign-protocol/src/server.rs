//! TCP accept loops
//!
//! One spawned task per inbound connection; handlers are cloned into each
//! task and share state only through what they hold behind `Arc`s.

use crate::aggregation::AggregationHandler;
use crate::distribution::{DistributionHandler, DistributionOutcome};
use async_trait::async_trait;
use cosign_core::{CosignError, Result, Summary};
use std::fmt::Debug;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpStream};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection entry point of a server
#[async_trait]
pub trait ConnectionHandler: Clone + Send + Sync + 'static {
    /// Result of one successful exchange
    type Outcome: Debug + Send;

    /// Name used in logs
    const NAME: &'static str;

    /// Serve one accepted connection
    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<Self::Outcome>;
}

#[async_trait]
impl ConnectionHandler for DistributionHandler {
    type Outcome = DistributionOutcome;
    const NAME: &'static str = "query-server";

    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<Self::Outcome> {
        self.handle(stream, Some(peer)).await
    }
}

#[async_trait]
impl ConnectionHandler for AggregationHandler {
    type Outcome = Summary;
    const NAME: &'static str = "summary-server";

    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<Self::Outcome> {
        self.handle(stream, Some(peer)).await
    }
}

/// Accept connections until `shutdown` resolves
pub async fn serve<H, F>(listener: TcpListener, handler: H, shutdown: F) -> Result<()>
where
    H: ConnectionHandler,
    F: Future<Output = ()> + Send,
{
    let local = listener.local_addr()?;
    tracing::info!(server = H::NAME, %local, "listening");
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            () = &mut shutdown => {
                tracing::info!(server = H::NAME, "shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(server = H::NAME, error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "could not disable nagle");
        }

        let handler = handler.clone();
        tokio::spawn(async move {
            match handler.serve_connection(stream, peer).await {
                Ok(outcome) => tracing::debug!(server = H::NAME, %peer, ?outcome, "exchange complete"),
                Err(e) => log_failure(H::NAME, peer, &e),
            }
        });
    }
}

fn log_failure(server: &str, peer: SocketAddr, error: &CosignError) {
    match error {
        CosignError::Network { .. } | CosignError::UnknownRegistry { .. } => {
            tracing::debug!(server, %peer, %error, "connection dropped");
        }
        CosignError::ConfigMissing { .. } | CosignError::Internal { .. } => {
            tracing::error!(server, %peer, %error, "exchange aborted");
        }
        _ => tracing::warn!(server, %peer, %error, "exchange failed"),
    }
}

/// Resolve a `host:port` listen address to the first socket address it names
pub async fn resolve_bind(addr: &str) -> Result<SocketAddr> {
    lookup_host(addr)
        .await
        .map_err(|e| CosignError::network(format!("cannot resolve {addr}: {e}")))?
        .next()
        .ok_or_else(|| CosignError::network(format!("{addr} resolves to no address")))
}

/// Bind `addr` (`host:port`) and serve until `shutdown` resolves
pub async fn bind_and_serve<H, F>(addr: &str, handler: H, shutdown: F) -> Result<()>
where
    H: ConnectionHandler,
    F: Future<Output = ()> + Send,
{
    let socket = resolve_bind(addr).await?;
    let listener = TcpListener::bind(socket)
        .await
        .map_err(|e| CosignError::network(format!("cannot bind {addr} ({socket}): {e}")))?;
    serve(listener, handler, shutdown).await
}
