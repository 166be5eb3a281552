//! Result lines, tallies and the aggregation wire types

use crate::identifiers::QueryId;
use crate::{CosignError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One decrypted (source, individual) result: field name → scalar value
pub type ResultLine = BTreeMap<String, Value>;

/// Inbound aggregation request, after the outer envelope is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRequest {
    /// Opaque metadata forwarded untouched
    #[serde(default)]
    pub metadata: Value,
    /// Query the results answer
    pub query_id: QueryId,
    /// Per individual, per source: one encrypted result line each
    #[serde(default)]
    pub data: Vec<Vec<String>>,
}

/// Field → value → occurrence count
///
/// Backed by ordered maps, so two tallies with the same counts compare and
/// serialize identically however they were accumulated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tally(BTreeMap<String, BTreeMap<String, u64>>);

impl Tally {
    /// Empty tally
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every (field, value) pair of one line
    ///
    /// The line is checked before anything is counted, so a rejected line
    /// leaves the tally untouched.
    pub fn record(&mut self, line: &ResultLine) -> Result<()> {
        let keyed = line
            .iter()
            .map(|(field, value)| value_key(field, value).map(|key| (field, key)))
            .collect::<Result<Vec<_>>>()?;

        for (field, key) in keyed {
            *self
                .0
                .entry(field.clone())
                .or_default()
                .entry(key)
                .or_insert(0) += 1;
        }
        Ok(())
    }

    /// Add every count of `other` into this tally
    pub fn merge(&mut self, other: Tally) {
        for (field, values) in other.0 {
            let counts = self.0.entry(field).or_default();
            for (value, count) in values {
                *counts.entry(value).or_insert(0) += count;
            }
        }
    }

    /// Count for one (field, value) pair
    pub fn count(&self, field: &str, value: &str) -> u64 {
        self.0
            .get(field)
            .and_then(|values| values.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// Value counts for one field
    pub fn field(&self, field: &str) -> Option<&BTreeMap<String, u64>> {
        self.0.get(field)
    }

    /// Whether nothing was counted
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.0.values().flat_map(|values| values.values()).sum()
    }
}

/// Summary pushed to the presentation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The tally
    pub data: Tally,
    /// Query the tally answers
    pub query_id: QueryId,
    /// Metadata carried over from the request
    pub metadata: Value,
}

// Strings count under their own text, other scalars under their JSON text,
// so `"true"` and `true` share a key.
fn value_key(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) | Value::Null => Ok(value.to_string()),
        Value::Array(_) | Value::Object(_) => Err(CosignError::invalid(format!(
            "field {field} holds a non-scalar value"
        ))),
    }
}
