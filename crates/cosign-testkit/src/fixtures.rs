//! Common test fixtures

use crate::crypto::MockCryptoHandler;
use cosign_core::{
    AggregationRequest, CryptoEffectsExt, FeedQuery, QueryId, RecipientKey, Result, ResultLine,
};
use serde_json::Value;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`, once per process
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Live feed entry for `id` eligible to `sources`
pub fn feed_query(id: &str, fields: Value, sources: &[&str]) -> FeedQuery {
    FeedQuery::new(id, fields, sources.iter().copied())
}

/// Result line from `(field, value)` pairs
pub fn result_line(pairs: &[(&str, Value)]) -> ResultLine {
    pairs
        .iter()
        .map(|(field, value)| ((*field).to_string(), value.clone()))
        .collect()
}

/// Aggregation request whose lines are sealed by `sources` for `recipient`
///
/// `individuals[i][j]` is the line source `j` reports for individual `i`.
pub async fn sealed_request(
    query_id: &str,
    metadata: Value,
    sources: &[MockCryptoHandler],
    individuals: &[Vec<ResultLine>],
    recipient: &RecipientKey,
) -> Result<AggregationRequest> {
    let mut data = Vec::with_capacity(individuals.len());
    for lines in individuals {
        let mut sealed = Vec::with_capacity(lines.len());
        for (source, line) in sources.iter().cycle().zip(lines) {
            sealed.push(source.seal_json(line, recipient).await?);
        }
        data.push(sealed);
    }
    Ok(AggregationRequest {
        metadata,
        query_id: QueryId::from(query_id),
        data,
    })
}
