//! # Cosign Node
//!
//! Wires configuration to production handlers. The `cosign` binary is a thin
//! CLI over this library; integration tests drive the same builders.

#![forbid(unsafe_code)]

use cosign_core::{CosignError, FeedEffects, NodeConfig, Result};
use cosign_effects::{
    AllowListVerifier, HttpFeedHandler, RealCryptoHandler, TcpPresentationHandler,
};
use cosign_protocol::{AggregationHandler, DistributionHandler};
use cosign_store::QueryStore;
use std::path::Path;
use std::sync::Arc;

/// Load configuration from `path` (defaults when absent), apply `COSIGN_*`
/// overrides and validate
pub fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::load_from_file(path)?,
        None => NodeConfig::default(),
    };
    config.merge_with_env()?;
    config.validate()?;
    Ok(config)
}

fn crypto_for(config: &NodeConfig) -> Result<RealCryptoHandler> {
    let crypto = RealCryptoHandler::from_config(config)?;
    if config.identity.signing_key.is_empty() {
        return Err(CosignError::config_missing("identity.signing_key is not set"));
    }
    if config.identity.decryption_key.is_empty() {
        return Err(CosignError::config_missing(
            "identity.decryption_key is not set",
        ));
    }
    Ok(crypto)
}

/// Query server pulling its feed over HTTP
pub fn query_server(config: &NodeConfig) -> Result<DistributionHandler> {
    if config.distribution.feed_url.trim().is_empty() {
        return Err(CosignError::config_missing("distribution.feed_url is not set"));
    }
    let feed = HttpFeedHandler::new(
        config.distribution.feed_url.clone(),
        config.distribution.feed_timeout(),
    )?;
    query_server_with_feed(config, Arc::new(feed))
}

/// Query server over an arbitrary feed
pub fn query_server_with_feed(
    config: &NodeConfig,
    feed: Arc<dyn FeedEffects>,
) -> Result<DistributionHandler> {
    let crypto = crypto_for(config)?;
    let store = QueryStore::with_purge_policy(config.distribution.purge_policy);
    Ok(DistributionHandler::new(
        config.distribution.clone(),
        Arc::new(store),
        Arc::new(crypto),
        feed,
        Arc::new(AllowListVerifier::from_config(&config.distribution)),
    ))
}

/// Summary server pushing to the configured presentation endpoint
pub fn summary_server(config: &NodeConfig) -> Result<AggregationHandler> {
    let crypto = crypto_for(config)?;
    let presentation = TcpPresentationHandler::new(
        config.aggregation.presentation_endpoint()?,
        config.aggregation.connect_timeout(),
    );
    AggregationHandler::new(&config.aggregation, Arc::new(crypto), Arc::new(presentation))
}
