//! Property tests for canonical serialization and chain extension

#![allow(clippy::unwrap_used)]

use cosign_core::{canonical_json, Attestation, SignedQuery, SignerId};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn arb_fields() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 0..8)
}

fn object_from(pairs: &[(String, i64)]) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert(key.clone(), Value::from(*value));
    }
    Value::Object(map)
}

proptest! {
    #[test]
    fn canonical_json_ignores_insertion_order(pairs in arb_fields()) {
        // later duplicates win on insert, so dedupe before comparing
        let mut seen = std::collections::BTreeMap::new();
        for (key, value) in &pairs {
            seen.insert(key.clone(), *value);
        }
        let deduped: Vec<_> = seen.into_iter().collect();
        let mut shuffled = deduped.clone();
        shuffled.reverse();

        prop_assert_eq!(
            canonical_json(&object_from(&deduped)),
            canonical_json(&object_from(&shuffled))
        );
    }

    #[test]
    fn canonical_json_round_trips_to_same_text(pairs in arb_fields()) {
        let text = canonical_json(&object_from(&pairs));
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(canonical_json(&reparsed), text);
    }

    #[test]
    fn appended_attestation_extends_base(pairs in arb_fields(), signers in prop::collection::vec("[a-z]{1,8}", 1..5)) {
        let mut doc = SignedQuery::unsigned(&object_from(&pairs));
        for signer in signers {
            let next = doc.clone().with_attestation(Attestation {
                signer: SignerId::from(signer.as_str()),
                signature: format!("sig-{signer}"),
            });
            prop_assert!(next.extends(&doc));
            prop_assert!(!doc.extends(&next));
            doc = next;
        }
    }
}
