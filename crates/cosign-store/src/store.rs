//! The query store
//!
//! Maps query id → [`QueryRecord`] for the whole process. Every handler shares
//! one `Arc<QueryStore>`; all access goes through the internal lock, which is
//! never held across an `.await`.

use cosign_core::{
    CosignError, CryptoEffects, CryptoEffectsExt, FeedQuery, PurgePolicy, QueryId, QueryRecord,
    RegistryId, Result, SignedQuery, VerifiedQuery,
};
use indexmap::map::Entry;
use indexmap::IndexMap;
use parking_lot::RwLock;

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New record created and baseline-signed
    Inserted,
    /// Record already present; left untouched
    Unchanged,
    /// Retired record removed
    Purged,
    /// Retirement for an id the store did not hold
    PurgedMissing,
}

/// Counts from one feed refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Records created
    pub inserted: usize,
    /// Records already present
    pub unchanged: usize,
    /// Records removed
    pub purged: usize,
    /// Retirements for unknown ids
    pub purged_missing: usize,
}

impl RefreshSummary {
    fn count(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Purged => self.purged += 1,
            UpsertOutcome::PurgedMissing => self.purged_missing += 1,
        }
    }
}

/// Result of merging one registry's reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Queries whose signature was merged
    pub merged: Vec<QueryId>,
    /// Entries turned away, with the reason
    pub rejected: Vec<(QueryId, CosignError)>,
}

impl MergeReport {
    /// Whether every entry merged
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// In-memory query store
#[derive(Debug, Default)]
pub struct QueryStore {
    records: RwLock<IndexMap<QueryId, QueryRecord>>,
    purge_policy: PurgePolicy,
}

impl QueryStore {
    /// Empty store with the default purge policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with an explicit purge policy
    pub fn with_purge_policy(purge_policy: PurgePolicy) -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            purge_policy,
        }
    }

    /// Apply one feed entry
    ///
    /// Retired entries remove the record whatever its signing progress. New
    /// entries are baseline-signed by `crypto` and inserted. Known entries are
    /// left alone, so re-ingesting a feed never re-signs or resets `signed_by`.
    pub async fn upsert_from_feed<C>(&self, entry: FeedQuery, crypto: &C) -> Result<UpsertOutcome>
    where
        C: CryptoEffects + ?Sized,
    {
        if entry.is_retired() {
            let removed = self.records.write().shift_remove(&entry.id).is_some();
            if removed {
                tracing::info!(query_id = %entry.id, "query retired upstream, purged");
                return Ok(UpsertOutcome::Purged);
            }
            if self.purge_policy == PurgePolicy::Warn {
                tracing::warn!(query_id = %entry.id, "retirement for a query the store never held");
            }
            return Ok(UpsertOutcome::PurgedMissing);
        }

        if self.contains(&entry.id) {
            return Ok(UpsertOutcome::Unchanged);
        }

        let signed = crypto.attest(SignedQuery::unsigned(&entry.fields)).await?;

        // another handler may have inserted while we were signing
        match self.records.write().entry(entry.id.clone()) {
            Entry::Occupied(_) => Ok(UpsertOutcome::Unchanged),
            Entry::Vacant(slot) => {
                tracing::debug!(query_id = %entry.id, "new query signed and stored");
                slot.insert(QueryRecord {
                    id: entry.id,
                    fields: entry.fields,
                    sources: entry.sources,
                    signed,
                    signed_by: Vec::new(),
                });
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Apply a whole feed in order
    pub async fn refresh<C, I>(&self, entries: I, crypto: &C) -> Result<RefreshSummary>
    where
        C: CryptoEffects + ?Sized,
        I: IntoIterator<Item = FeedQuery> + Send,
        I::IntoIter: Send,
    {
        let mut summary = RefreshSummary::default();
        for entry in entries {
            summary.count(self.upsert_from_feed(entry, crypto).await?);
        }
        Ok(summary)
    }

    /// Live records `registry` may sign, in insertion order
    pub fn filter_for(&self, registry: &RegistryId) -> Vec<QueryRecord> {
        self.records
            .read()
            .values()
            .filter(|record| record.is_eligible(registry))
            .cloned()
            .collect()
    }

    /// Merge one verified signature from `registry`
    pub fn merge_signature(
        &self,
        query_id: &QueryId,
        registry: &RegistryId,
        verified: VerifiedQuery,
    ) -> Result<()> {
        merge_into(&mut self.records.write(), query_id, registry, verified)
    }

    /// Merge a verified reply batch under one lock
    ///
    /// Each entry succeeds or fails on its own; a rejected entry leaves its
    /// record unchanged.
    pub fn merge_batch(
        &self,
        registry: &RegistryId,
        batch: impl IntoIterator<Item = (QueryId, VerifiedQuery)>,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        let mut records = self.records.write();
        for (query_id, verified) in batch {
            match merge_into(&mut records, &query_id, registry, verified) {
                Ok(()) => report.merged.push(query_id),
                Err(err) => {
                    tracing::warn!(%query_id, %registry, error = %err, "signature not merged");
                    report.rejected.push((query_id, err));
                }
            }
        }
        report
    }

    /// Copy of one record
    pub fn get(&self, query_id: &QueryId) -> Option<QueryRecord> {
        self.records.read().get(query_id).cloned()
    }

    /// Whether the store holds `query_id`
    pub fn contains(&self, query_id: &QueryId) -> bool {
        self.records.read().contains_key(query_id)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every record, in insertion order
    pub fn snapshot(&self) -> Vec<QueryRecord> {
        self.records.read().values().cloned().collect()
    }
}

fn merge_into(
    records: &mut IndexMap<QueryId, QueryRecord>,
    query_id: &QueryId,
    registry: &RegistryId,
    verified: VerifiedQuery,
) -> Result<()> {
    let record = records
        .get_mut(query_id)
        .ok_or_else(|| CosignError::unknown_query(query_id.as_str()))?;

    if record.is_signed_by(registry) {
        return Err(CosignError::already_signed(
            query_id.as_str(),
            registry.as_str(),
        ));
    }
    let document = verified.document();
    if !document.covers(&record.fields) {
        return Err(CosignError::signature_invalid(
            query_id.as_str(),
            "signed content does not match the query fields",
        ));
    }
    if !document.extends(&record.signed) {
        return Err(CosignError::stale_signature(query_id.as_str()));
    }

    record.signed_by.push(registry.clone());
    record.signed = verified.into_inner();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cosign_testkit::{feed_query, MockCryptoHandler};
    use serde_json::json;

    async fn cosign(
        registry: &MockCryptoHandler,
        server: &MockCryptoHandler,
        record: &QueryRecord,
    ) -> VerifiedQuery {
        let doc = registry.attest(record.signed.clone()).await.unwrap();
        server.verify_query(record.id.as_str(), doc).await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let crypto = MockCryptoHandler::new("query-server");
        let store = QueryStore::new();
        let entry = feed_query("q1", json!({"a": 1}), &["hunt"]);

        assert_eq!(
            store.upsert_from_feed(entry.clone(), &crypto).await.unwrap(),
            UpsertOutcome::Inserted
        );
        let first = store.get(&"q1".into()).unwrap();

        assert_eq!(
            store.upsert_from_feed(entry, &crypto).await.unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"q1".into()).unwrap(), first);
        assert!(first.signed_by.is_empty());
        assert_eq!(first.signed.latest_signer().unwrap().as_str(), "query-server");
    }

    #[tokio::test]
    async fn test_reingest_does_not_reset_signed_by() {
        let server = MockCryptoHandler::new("query-server");
        let hunt = MockCryptoHandler::new("hunt");
        let store = QueryStore::new();
        let entry = feed_query("q1", json!({"a": 1}), &["hunt", "cancer"]);

        store.upsert_from_feed(entry.clone(), &server).await.unwrap();
        let record = store.get(&"q1".into()).unwrap();
        let verified = cosign(&hunt, &server, &record).await;
        store
            .merge_signature(&"q1".into(), &"hunt".into(), verified)
            .unwrap();

        store.upsert_from_feed(entry, &server).await.unwrap();
        let record = store.get(&"q1".into()).unwrap();
        assert_eq!(record.signed_by, vec![RegistryId::from("hunt")]);
        assert_eq!(record.signed.signatures.len(), 2);
    }

    #[tokio::test]
    async fn test_status_purges_mid_signing() {
        let server = MockCryptoHandler::new("query-server");
        let hunt = MockCryptoHandler::new("hunt");
        let store = QueryStore::new();
        store
            .upsert_from_feed(feed_query("q1", json!({}), &["hunt"]), &server)
            .await
            .unwrap();
        let record = store.get(&"q1".into()).unwrap();
        let verified = cosign(&hunt, &server, &record).await;
        store
            .merge_signature(&"q1".into(), &"hunt".into(), verified)
            .unwrap();

        let outcome = store
            .upsert_from_feed(
                feed_query("q1", json!({}), &["hunt"]).with_status("done"),
                &server,
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Purged);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purging_absent_id_is_noop() {
        let server = MockCryptoHandler::new("query-server");
        for policy in [PurgePolicy::Ignore, PurgePolicy::Warn] {
            let store = QueryStore::with_purge_policy(policy);
            let outcome = store
                .upsert_from_feed(feed_query("ghost", json!({}), &[]).with_status("done"), &server)
                .await
                .unwrap();
            assert_eq!(outcome, UpsertOutcome::PurgedMissing);
            assert!(store.is_empty());
        }
    }

    #[tokio::test]
    async fn test_refresh_counts_outcomes() {
        let server = MockCryptoHandler::new("query-server");
        let store = QueryStore::new();
        let feed = vec![
            feed_query("q1", json!({"a": 1}), &["hunt"]),
            feed_query("q2", json!({"a": 2}), &["cancer"]),
            feed_query("q3", json!({}), &[]).with_status("done"),
        ];

        let first = store.refresh(feed.clone(), &server).await.unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.purged_missing, 1);

        let second = store.refresh(feed, &server).await.unwrap();
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.inserted, 0);
    }

    #[tokio::test]
    async fn test_merge_unknown_query() {
        let server = MockCryptoHandler::new("query-server");
        let hunt = MockCryptoHandler::new("hunt");
        let store = QueryStore::new();
        store
            .upsert_from_feed(feed_query("q1", json!({}), &["hunt"]), &server)
            .await
            .unwrap();
        let record = store.get(&"q1".into()).unwrap();
        let verified = cosign(&hunt, &server, &record).await;

        assert_matches!(
            store.merge_signature(&"q2".into(), &"hunt".into(), verified),
            Err(CosignError::UnknownQuery { .. })
        );
        assert!(store.get(&"q1".into()).unwrap().signed_by.is_empty());
    }

    #[tokio::test]
    async fn test_merge_rejects_content_of_another_query() {
        let server = MockCryptoHandler::new("query-server");
        let hunt = MockCryptoHandler::new("hunt");
        let store = QueryStore::new();
        store
            .refresh(
                vec![
                    feed_query("q1", json!({"a": 1}), &["hunt"]),
                    feed_query("q2", json!({"a": 2}), &["hunt"]),
                ],
                &server,
            )
            .await
            .unwrap();

        let q2 = store.get(&"q2".into()).unwrap();
        let verified = cosign(&hunt, &server, &q2).await;

        let before = store.get(&"q1".into()).unwrap();
        assert_matches!(
            store.merge_signature(&"q1".into(), &"hunt".into(), verified),
            Err(CosignError::SignatureInvalid { .. })
        );
        assert_eq!(store.get(&"q1".into()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_merge_rejects_stale_chain_and_double_signing() {
        let server = MockCryptoHandler::new("query-server");
        let hunt = MockCryptoHandler::new("hunt");
        let cancer = MockCryptoHandler::new("cancer");
        let store = QueryStore::new();
        store
            .upsert_from_feed(feed_query("q1", json!({}), &["hunt", "cancer"]), &server)
            .await
            .unwrap();

        // both registries sign the same baseline
        let record = store.get(&"q1".into()).unwrap();
        let from_hunt = cosign(&hunt, &server, &record).await;
        let from_cancer = cosign(&cancer, &server, &record).await;

        store
            .merge_signature(&"q1".into(), &"hunt".into(), from_hunt.clone())
            .unwrap();
        assert_matches!(
            store.merge_signature(&"q1".into(), &"cancer".into(), from_cancer),
            Err(CosignError::StaleSignature { .. })
        );
        assert_matches!(
            store.merge_signature(&"q1".into(), &"hunt".into(), from_hunt),
            Err(CosignError::AlreadySigned { .. })
        );

        // cancer re-signs on top of hunt and succeeds
        let record = store.get(&"q1".into()).unwrap();
        let from_cancer = cosign(&cancer, &server, &record).await;
        store
            .merge_signature(&"q1".into(), &"cancer".into(), from_cancer)
            .unwrap();

        let record = store.get(&"q1".into()).unwrap();
        assert_eq!(
            record.signed_by,
            vec![RegistryId::from("hunt"), RegistryId::from("cancer")]
        );
        assert!(record.is_fully_signed());
    }

    #[tokio::test]
    async fn test_merge_batch_reports_per_entry() {
        let server = MockCryptoHandler::new("query-server");
        let hunt = MockCryptoHandler::new("hunt");
        let store = QueryStore::new();
        store
            .refresh(
                vec![
                    feed_query("q1", json!({"a": 1}), &["hunt"]),
                    feed_query("q2", json!({"a": 2}), &["hunt"]),
                ],
                &server,
            )
            .await
            .unwrap();

        let q1 = cosign(&hunt, &server, &store.get(&"q1".into()).unwrap()).await;
        let q2 = cosign(&hunt, &server, &store.get(&"q2".into()).unwrap()).await;
        store
            .upsert_from_feed(feed_query("q2", json!({}), &[]).with_status("done"), &server)
            .await
            .unwrap();

        let report = store.merge_batch(&"hunt".into(), vec![("q1".into(), q1), ("q2".into(), q2)]);
        assert_eq!(report.merged, vec![QueryId::from("q1")]);
        assert_eq!(report.rejected.len(), 1);
        assert_matches!(report.rejected[0].1, CosignError::UnknownQuery { .. });
        assert!(!report.is_clean());
    }
}
