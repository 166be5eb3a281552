//! HTTP feed handler

use async_trait::async_trait;
use cosign_core::effects::FeedEffects;
use cosign_core::{CosignError, FeedDocument, FeedQuery, Result};
use std::time::Duration;

/// Pulls the published query list from the web front end
#[derive(Debug, Clone)]
pub struct HttpFeedHandler {
    client: reqwest::Client,
    url: String,
}

impl HttpFeedHandler {
    /// Create a handler for `url` with a whole-request timeout
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CosignError::feed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Feed URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedEffects for HttpFeedHandler {
    async fn fetch_queries(&self) -> Result<Vec<FeedQuery>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CosignError::feed(format!("GET {} failed: {e}", self.url)))?
            .error_for_status()
            .map_err(|e| CosignError::feed(format!("GET {} failed: {e}", self.url)))?;

        let body = response
            .text()
            .await
            .map_err(|e| CosignError::feed(format!("reading feed body failed: {e}")))?;
        tracing::debug!(bytes = body.len(), "fetched query feed");

        parse_feed(&body)
    }
}

/// Parse a feed body of the form `{"queries": [...]}`
pub fn parse_feed(body: &str) -> Result<Vec<FeedQuery>> {
    let document: FeedDocument = serde_json::from_str(body)
        .map_err(|e| CosignError::feed(format!("malformed feed: {e}")))?;
    Ok(document.queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed() {
        let queries = parse_feed(
            r#"{"queries": [{"id": "q1", "fields": {"a": 1}, "sources": ["hunt"]}]}"#,
        )
        .unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].id.as_str(), "q1");
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(matches!(
            parse_feed("<html>"),
            Err(CosignError::Feed { .. })
        ));
        assert!(parse_feed("{}").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_feed_error() {
        let feed = HttpFeedHandler::new("http://127.0.0.1:1/queries", Duration::from_secs(1))
            .unwrap();
        assert!(matches!(
            feed.fetch_queries().await,
            Err(CosignError::Feed { .. })
        ));
    }
}
