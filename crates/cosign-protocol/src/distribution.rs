//! Query distribution exchange
//!
//! One registry per connection:
//!
//! ```text
//! registry -> server   {"source_id": "..."}            plain JSON line
//! server   -> registry seal({"queries": [...]})        one frame
//! registry -> server   seal({query_id: SignedQuery})   one frame
//! ```
//!
//! The reply is verified as a whole before anything is merged.

use cosign_core::{
    CosignError, CryptoEffects, CryptoEffectsExt, DistributionConfig, FeedEffects, PeerClaim,
    QueryBatch, QueryId, RegistryId, RegistryRequest, RegistryVerifier, Result, SignedQuery,
    SignerId, VerifiedQuery,
};
use cosign_effects::LineTransport;
use cosign_store::{MergeReport, QueryStore, SigningWindows};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{split, AsyncRead, AsyncWrite, BufReader};
use tracing::instrument;

/// What one completed exchange did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionOutcome {
    /// Registry served
    pub registry: RegistryId,
    /// Queries offered for signing
    pub offered: usize,
    /// Merge result for the reply
    pub report: MergeReport,
}

/// Serves registries; clone per connection
#[derive(Clone)]
pub struct DistributionHandler {
    config: Arc<DistributionConfig>,
    store: Arc<QueryStore>,
    windows: Arc<SigningWindows>,
    crypto: Arc<dyn CryptoEffects>,
    feed: Arc<dyn FeedEffects>,
    verifier: Arc<dyn RegistryVerifier>,
    transport: LineTransport,
}

impl std::fmt::Debug for DistributionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionHandler")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("windows", &self.windows)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl DistributionHandler {
    /// Create a handler with fresh signing windows
    pub fn new(
        config: DistributionConfig,
        store: Arc<QueryStore>,
        crypto: Arc<dyn CryptoEffects>,
        feed: Arc<dyn FeedEffects>,
        verifier: Arc<dyn RegistryVerifier>,
    ) -> Self {
        let windows = Arc::new(SigningWindows::new(config.window_policy));
        let transport = LineTransport {
            read_timeout: config.request_timeout(),
            max_frame_bytes: config.max_frame_bytes,
            ..LineTransport::default()
        };
        Self {
            config: Arc::new(config),
            store,
            windows,
            crypto,
            feed,
            verifier,
            transport,
        }
    }

    /// Shared store
    pub fn store(&self) -> &Arc<QueryStore> {
        &self.store
    }

    /// Shared signing windows
    pub fn windows(&self) -> &Arc<SigningWindows> {
        &self.windows
    }

    /// Run one exchange to completion
    ///
    /// Every error ends the exchange without a response; the signing window
    /// is released on every path.
    #[instrument(skip(self, stream), fields(registry = tracing::field::Empty))]
    pub async fn handle<S>(
        &self,
        stream: S,
        peer_addr: Option<SocketAddr>,
    ) -> Result<DistributionOutcome>
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        let (reader, mut writer) = split(stream);
        let mut reader = BufReader::new(reader);

        // 1. request line
        let line = self
            .transport
            .read_line(&mut reader)
            .await?
            .ok_or_else(|| CosignError::network("peer closed before sending a request"))?;
        let request: RegistryRequest = serde_json::from_str(&line)
            .map_err(|e| CosignError::invalid(format!("malformed registry request: {e}")))?;

        // 2. identity, before the feed or store are touched
        let registry = self
            .verifier
            .verify_registry(&PeerClaim {
                source_id: request.source_id,
                peer_addr,
            })
            .await?;
        tracing::Span::current().record("registry", registry.as_str());

        // 3. recipient key
        let recipient = self.config.recipient_for(&registry)?;

        // 4. signing window, held until the reply is merged
        let lease = self
            .windows
            .acquire(&registry, self.config.window_timeout())
            .await?;

        // 5. refresh and offer
        let entries = self.feed.fetch_queries().await?;
        let summary = self.store.refresh(entries, self.crypto.as_ref()).await?;
        tracing::debug!(?summary, "store refreshed");

        let batch = QueryBatch {
            queries: self.store.filter_for(&registry),
        };
        let offered: BTreeSet<QueryId> = batch.queries.iter().map(|q| q.id.clone()).collect();
        let frame = self.crypto.seal_json(&batch, &recipient).await?;
        self.transport.write_line(&mut writer, &frame).await?;
        tracing::debug!(offered = offered.len(), "batch sent");

        // 6. reply within the signing window
        let reply = self
            .transport
            .read_line_within(&mut reader, self.config.window_timeout())
            .await?
            .ok_or_else(|| CosignError::network("registry closed before replying"))?;
        let signed: BTreeMap<String, SignedQuery> = self.crypto.open_json(&reply).await?;

        // 7. verify everything, then merge
        let verified = self.verify_reply(&registry, signed).await?;
        let mut report = MergeReport::default();
        let mut accepted = Vec::with_capacity(verified.len());
        for (query_id, document) in verified {
            if offered.contains(&query_id) {
                accepted.push((query_id, document));
            } else {
                tracing::warn!(%query_id, "reply carries a query that was not offered");
                report
                    .rejected
                    .push((query_id.clone(), CosignError::unknown_query(query_id.as_str())));
            }
        }
        let merged = self.store.merge_batch(&registry, accepted);
        report.merged = merged.merged;
        report.rejected.extend(merged.rejected);
        drop(lease);

        tracing::info!(
            offered = offered.len(),
            merged = report.merged.len(),
            rejected = report.rejected.len(),
            "registry signatures merged"
        );
        Ok(DistributionOutcome {
            registry,
            offered: offered.len(),
            report,
        })
    }

    async fn verify_reply(
        &self,
        registry: &RegistryId,
        signed: BTreeMap<String, SignedQuery>,
    ) -> Result<Vec<(QueryId, VerifiedQuery)>> {
        let expected = SignerId::from(registry);
        let mut verified = Vec::with_capacity(signed.len());
        for (query_id, document) in signed {
            if document.latest_signer() != Some(&expected) {
                return Err(CosignError::signature_invalid(
                    query_id,
                    format!("newest attestation is not by {registry}"),
                ));
            }
            let document = self.crypto.verify_query(&query_id, document).await?;
            verified.push((QueryId::from(query_id), document));
        }
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cosign_core::PurgePolicy;
    use cosign_effects::AllowListVerifier;
    use cosign_testkit::{
        feed_query, recipient_hex_for, recipient_key_for, MemoryFeed, MockCryptoHandler,
        RegistryClient,
    };
    use serde_json::json;
    use tokio::io::duplex;

    fn config() -> DistributionConfig {
        let mut config = DistributionConfig::default();
        for registry in ["hunt", "cancer", "death"] {
            config
                .recipients
                .insert(registry.into(), recipient_hex_for(registry));
        }
        config.window_timeout_secs = 1;
        config
    }

    fn handler(config: DistributionConfig, feed: &MemoryFeed) -> DistributionHandler {
        let verifier = AllowListVerifier::from_config(&config);
        DistributionHandler::new(
            config,
            Arc::new(QueryStore::with_purge_policy(PurgePolicy::Warn)),
            Arc::new(MockCryptoHandler::new("query-server")),
            Arc::new(feed.clone()),
            Arc::new(verifier),
        )
    }

    fn client(registry: &str) -> RegistryClient<MockCryptoHandler> {
        RegistryClient::new(
            registry,
            MockCryptoHandler::new(registry),
            recipient_key_for("query-server"),
        )
    }

    #[tokio::test]
    async fn test_honest_exchange_merges_everything_offered() {
        let feed = MemoryFeed::new(vec![
            feed_query("q1", json!({"a": 1}), &["hunt"]),
            feed_query("q2", json!({"a": 2}), &["cancer"]),
        ]);
        let server = handler(config(), &feed);
        let (ours, theirs) = duplex(64 * 1024);

        let peer = client("hunt");
        let (outcome, batch) = tokio::join!(
            server.handle(ours, None),
            peer.sign_all(theirs)
        );
        let outcome = outcome.unwrap();
        let batch = batch.unwrap();

        assert_eq!(batch.queries.len(), 1);
        assert_eq!(outcome.offered, 1);
        assert_eq!(outcome.report.merged, vec![QueryId::from("q1")]);
        let record = server.store().get(&"q1".into()).unwrap();
        assert_eq!(record.signed_by, vec![RegistryId::from("hunt")]);
        assert!(server.store().get(&"q2".into()).unwrap().signed_by.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_registry_never_fetches() {
        let feed = MemoryFeed::new(vec![feed_query("q1", json!({}), &["hunt"])]);
        let server = handler(config(), &feed);
        let (ours, theirs) = duplex(4096);

        let peer = client("mallory");
        let (outcome, _session) = tokio::join!(
            server.handle(ours, None),
            peer.send_request(theirs)
        );
        assert_matches!(outcome, Err(CosignError::UnknownRegistry { .. }));
        assert_eq!(feed.fetch_count(), 0);
        assert!(server.store().is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipient_aborts_before_fetch() {
        let feed = MemoryFeed::new(vec![feed_query("q1", json!({}), &["death"])]);
        let mut config = config();
        config.recipients.remove(&RegistryId::from("death"));
        let server = handler(config, &feed);
        let (ours, theirs) = duplex(4096);

        let peer = client("death");
        let (outcome, _session) = tokio::join!(
            server.handle(ours, None),
            peer.send_request(theirs)
        );
        assert_matches!(outcome, Err(CosignError::ConfigMissing { .. }));
        assert_eq!(feed.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_request_is_invalid() {
        let feed = MemoryFeed::default();
        let server = handler(config(), &feed);
        let (ours, mut theirs) = duplex(4096);

        let writer = async {
            LineTransport::default()
                .write_line(&mut theirs, "not json")
                .await
                .unwrap();
            theirs
        };
        let (outcome, _theirs) = tokio::join!(server.handle(ours, None), writer);
        assert_matches!(outcome, Err(CosignError::Invalid { .. }));
        assert_eq!(feed.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_one_bad_signature_rejects_whole_reply() {
        let feed = MemoryFeed::new(vec![
            feed_query("q1", json!({"a": 1}), &["hunt"]),
            feed_query("q2", json!({"a": 2}), &["hunt"]),
        ]);
        let server = handler(config(), &feed);
        let registry = client("hunt");
        let (ours, theirs) = duplex(64 * 1024);

        let exchange = async {
            let (batch, session) = registry.open(theirs).await.unwrap();
            let mut reply = registry.cosign(&batch).await.unwrap();
            let q2 = reply.get_mut("q2").unwrap();
            q2.signatures.last_mut().unwrap().signature = "AAAA".to_string();
            registry.reply(session, &reply).await.unwrap();
        };
        let (outcome, ()) = tokio::join!(server.handle(ours, None), exchange);

        assert_matches!(outcome, Err(CosignError::SignatureInvalid { .. }));
        for id in ["q1", "q2"] {
            assert!(server.store().get(&id.into()).unwrap().signed_by.is_empty());
        }
    }

    #[tokio::test]
    async fn test_reply_must_be_signed_by_requester() {
        let feed = MemoryFeed::new(vec![feed_query("q1", json!({}), &["hunt"])]);
        let server = handler(config(), &feed);
        let registry = client("hunt");
        let impostor = client("cancer");
        let (ours, theirs) = duplex(64 * 1024);

        let exchange = async {
            let (batch, session) = registry.open(theirs).await.unwrap();
            let reply = impostor.cosign(&batch).await.unwrap();
            registry.reply(session, &reply).await.unwrap();
        };
        let (outcome, ()) = tokio::join!(server.handle(ours, None), exchange);

        assert_matches!(outcome, Err(CosignError::SignatureInvalid { .. }));
        assert!(server.store().get(&"q1".into()).unwrap().signed_by.is_empty());
    }

    #[tokio::test]
    async fn test_silent_registry_times_out_and_releases_window() {
        let feed = MemoryFeed::new(vec![feed_query("q1", json!({}), &["hunt"])]);
        let server = handler(config(), &feed);
        let registry = client("hunt");
        let (ours, theirs) = duplex(64 * 1024);

        let (outcome, opened) = tokio::join!(server.handle(ours, None), registry.open(theirs));
        let (_batch, _session) = opened.unwrap();

        assert_matches!(outcome, Err(CosignError::Timeout { .. }));
        assert!(!server.windows().is_held(&"hunt".into()));
        assert!(server.store().get(&"q1".into()).unwrap().signed_by.is_empty());

        // the next exchange proceeds normally
        let (ours, theirs) = duplex(64 * 1024);
        let (outcome, batch) = tokio::join!(server.handle(ours, None), registry.sign_all(theirs));
        assert_eq!(outcome.unwrap().report.merged.len(), 1);
        assert_eq!(batch.unwrap().queries.len(), 1);
    }

    #[tokio::test]
    async fn test_unoffered_entries_are_rejected_individually() {
        let feed = MemoryFeed::new(vec![
            feed_query("q1", json!({"a": 1}), &["hunt"]),
            feed_query("q2", json!({"a": 2}), &["cancer"]),
        ]);
        let server = handler(config(), &feed);
        let registry = client("hunt");

        // populate the store so q2 exists but is not offered to hunt
        let (ours, theirs) = duplex(64 * 1024);
        let cancer = client("cancer");
        let (outcome, _) = tokio::join!(server.handle(ours, None), cancer.sign_all(theirs));
        outcome.unwrap();
        let q2 = server.store().get(&"q2".into()).unwrap();

        let (ours, theirs) = duplex(64 * 1024);
        let exchange = async {
            let (batch, session) = registry.open(theirs).await.unwrap();
            let mut reply = registry.cosign(&batch).await.unwrap();
            let stray = registry.cosign(&QueryBatch { queries: vec![q2] }).await.unwrap();
            reply.extend(stray);
            registry.reply(session, &reply).await.unwrap();
        };
        let (outcome, ()) = tokio::join!(server.handle(ours, None), exchange);
        let outcome = outcome.unwrap();

        assert_eq!(outcome.report.merged, vec![QueryId::from("q1")]);
        assert_eq!(outcome.report.rejected.len(), 1);
        assert_eq!(
            server.store().get(&"q2".into()).unwrap().signed_by,
            vec![RegistryId::from("cancer")]
        );
    }
}
