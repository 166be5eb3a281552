//! Upstream query feed effect

use crate::query::FeedQuery;
use crate::Result;
use async_trait::async_trait;

/// Source of the published query list
#[async_trait]
pub trait FeedEffects: Send + Sync {
    /// Fetch every query currently published upstream
    async fn fetch_queries(&self) -> Result<Vec<FeedQuery>>;
}
