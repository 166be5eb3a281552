//! Query feed entries and store records

use crate::identifiers::{QueryId, RegistryId};
use crate::signed::SignedQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// One entry of the upstream query feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedQuery {
    /// Query identifier
    pub id: QueryId,
    /// Terminal marker; any truthy value retires the query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    /// Payload to be signed
    #[serde(default)]
    pub fields: Value,
    /// Registries eligible to co-sign
    #[serde(default)]
    pub sources: BTreeSet<RegistryId>,
}

impl FeedQuery {
    /// Create a live (unretired) feed entry
    pub fn new(
        id: impl Into<QueryId>,
        fields: Value,
        sources: impl IntoIterator<Item = impl Into<RegistryId>>,
    ) -> Self {
        Self {
            id: id.into(),
            status: None,
            fields,
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    /// Mark this entry with a terminal status
    pub fn with_status(mut self, status: impl Into<Value>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Whether upstream has retired this query
    ///
    /// Empty strings, `false`, `0` and `null` count as unset.
    pub fn is_retired(&self) -> bool {
        match &self.status {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
        }
    }
}

/// Body of the upstream feed: `{"queries": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedDocument {
    /// All queries currently published
    #[serde(default)]
    pub queries: Vec<FeedQuery>,
}

/// A live query held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Query identifier
    pub id: QueryId,
    /// Payload covered by every signature
    pub fields: Value,
    /// Registries eligible to co-sign
    pub sources: BTreeSet<RegistryId>,
    /// Current signed representation
    pub signed: SignedQuery,
    /// Registries whose signatures were verified and merged, in merge order
    pub signed_by: Vec<RegistryId>,
}

impl QueryRecord {
    /// Whether `registry` may sign this query
    pub fn is_eligible(&self, registry: &RegistryId) -> bool {
        self.sources.contains(registry)
    }

    /// Whether `registry` already contributed a signature
    pub fn is_signed_by(&self, registry: &RegistryId) -> bool {
        self.signed_by.contains(registry)
    }

    /// Whether every eligible registry has co-signed
    pub fn is_fully_signed(&self) -> bool {
        self.sources.iter().all(|source| self.is_signed_by(source))
    }

    /// Canonical text of `fields`
    pub fn canonical_fields(&self) -> String {
        canonical_json(&self.fields)
    }
}

/// Batch of records offered to one registry: `{"queries": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryBatch {
    /// Records the registry may sign
    pub queries: Vec<QueryRecord>,
}

/// Registry request line: `{"source_id": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRequest {
    /// Identifier the registry claims
    pub source_id: RegistryId,
}

/// Serialize a JSON value with object keys sorted at every depth
///
/// Signatures are computed over this text, so it must not depend on the
/// order keys arrived in.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
