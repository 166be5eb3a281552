//! Downstream delivery of encrypted summaries

use crate::Result;
use async_trait::async_trait;

/// Sink for finished summary frames
#[async_trait]
pub trait PresentationEffects: Send + Sync {
    /// Deliver one already-encrypted frame to the presentation endpoint
    async fn deliver(&self, frame: String) -> Result<()>;
}
