//! Result aggregation exchange
//!
//! The inbound frame carries one encrypted line per (individual, source).
//! Lines are opened and tallied; only the tally leaves this node, sealed for
//! the presentation endpoint. Any line that fails to open aborts the request.

use cosign_core::{
    AggregationConfig, AggregationRequest, CosignError, CryptoEffects, CryptoEffectsExt,
    PresentationEffects, RecipientKey, Result, ResultLine, Summary, Tally,
};
use cosign_effects::LineTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{split, AsyncRead, AsyncWrite, BufReader};
use tracing::instrument;

/// Tally decrypted result lines
///
/// Counts are independent of line order.
pub fn summarize<'a>(lines: impl IntoIterator<Item = &'a ResultLine>) -> Result<Tally> {
    let mut tally = Tally::new();
    for line in lines {
        tally.record(line)?;
    }
    Ok(tally)
}

/// Serves aggregation requests; clone per connection
#[derive(Clone)]
pub struct AggregationHandler {
    crypto: Arc<dyn CryptoEffects>,
    presentation: Arc<dyn PresentationEffects>,
    presentation_key: RecipientKey,
    transport: LineTransport,
}

impl std::fmt::Debug for AggregationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationHandler")
            .field("presentation_key", &self.presentation_key)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl AggregationHandler {
    /// Create a handler, failing with `ConfigMissing` when no presentation
    /// recipient is configured
    pub fn new(
        config: &AggregationConfig,
        crypto: Arc<dyn CryptoEffects>,
        presentation: Arc<dyn PresentationEffects>,
    ) -> Result<Self> {
        let presentation_key = config.presentation_key()?;
        let transport = LineTransport {
            read_timeout: config.request_timeout(),
            write_timeout: config.connect_timeout(),
            max_frame_bytes: config.max_frame_bytes,
        };
        Ok(Self {
            crypto,
            presentation,
            presentation_key,
            transport,
        })
    }

    /// Open every line of `request` and tally them
    pub async fn tally(&self, request: &AggregationRequest) -> Result<Tally> {
        let mut lines = Vec::new();
        for (individual, sources) in request.data.iter().enumerate() {
            for frame in sources {
                let line: ResultLine = self.crypto.open_json(frame).await.map_err(|e| {
                    tracing::warn!(individual, error = %e, "result line did not open");
                    e
                })?;
                lines.push(line);
            }
        }
        summarize(&lines)
    }

    /// Run one exchange to completion
    ///
    /// On success the summary has been delivered and an empty
    /// acknowledgement written; on failure nothing is sent anywhere.
    #[instrument(skip(self, stream), fields(query_id = tracing::field::Empty))]
    pub async fn handle<S>(&self, stream: S, peer_addr: Option<SocketAddr>) -> Result<Summary>
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        let (reader, mut writer) = split(stream);
        let mut reader = BufReader::new(reader);

        let frame = self
            .transport
            .read_line(&mut reader)
            .await?
            .ok_or_else(|| CosignError::network("peer closed before sending results"))?;
        let request: AggregationRequest = self.crypto.open_json(&frame).await?;
        tracing::Span::current().record("query_id", request.query_id.as_str());

        let data = self.tally(&request).await?;
        let summary = Summary {
            data,
            query_id: request.query_id,
            metadata: request.metadata,
        };

        let sealed = self
            .crypto
            .seal_json(&summary, &self.presentation_key)
            .await?;
        self.presentation.deliver(sealed).await?;
        self.transport.write_line(&mut writer, "").await?;

        tracing::info!(
            individuals = request.data.len(),
            counted = summary.data.total(),
            "summary delivered"
        );
        Ok(summary)
    }
}
