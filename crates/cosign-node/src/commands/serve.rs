//! Server commands

use anyhow::{Context, Result};
use cosign_core::NodeConfig;
use cosign_protocol::bind_and_serve;
use tracing::info;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received");
}

/// Run the query distribution server until interrupted
pub async fn query_server(config: &NodeConfig) -> Result<()> {
    let addr = config.distribution.bind_addr()?;
    let handler = cosign_node::query_server(config).context("query server setup failed")?;
    info!(
        %addr,
        feed = %config.distribution.feed_url,
        window_timeout_secs = config.distribution.window_timeout_secs,
        "starting query server"
    );
    bind_and_serve(addr, handler, shutdown_signal()).await?;
    Ok(())
}

/// Run the aggregation server until interrupted
pub async fn summary_server(config: &NodeConfig) -> Result<()> {
    let addr = config.aggregation.bind_addr()?;
    let handler = cosign_node::summary_server(config).context("summary server setup failed")?;
    info!(
        %addr,
        presentation = %config.aggregation.presentation_addr,
        "starting summary server"
    );
    bind_and_serve(addr, handler, shutdown_signal()).await?;
    Ok(())
}
