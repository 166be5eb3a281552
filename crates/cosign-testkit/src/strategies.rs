//! Property test strategies for cosign types

use cosign_core::{FeedQuery, ResultLine};
use proptest::prelude::*;
use serde_json::{json, Value};

// Re-export proptest for convenience
pub use proptest;

/// Registry ids drawn from the default allow-list
pub fn arb_registry() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("hunt"), Just("cancer"), Just("death")]
}

/// Small scalar JSON values
pub fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z]{0,6}".prop_map(Value::from),
        (0i64..100).prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Query fields: a small flat JSON object
pub fn arb_fields() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,4}", arb_scalar(), 0..4)
        .prop_map(|map| json!(map))
}

/// One feed entry over a small id space so retirements hit live ids
pub fn arb_feed_query() -> impl Strategy<Value = FeedQuery> {
    (
        0u8..8,
        arb_fields(),
        prop::collection::btree_set(arb_registry(), 0..=3),
        prop::option::weighted(0.2, Just("done")),
    )
        .prop_map(|(n, fields, sources, status)| {
            let entry = FeedQuery::new(format!("q{n}"), fields, sources);
            match status {
                Some(status) => entry.with_status(status),
                None => entry,
            }
        })
}

/// A whole feed
pub fn arb_feed() -> impl Strategy<Value = Vec<FeedQuery>> {
    prop::collection::vec(arb_feed_query(), 0..24)
}

/// A result line over a fixed field vocabulary
pub fn arb_result_line() -> impl Strategy<Value = ResultLine> {
    prop::collection::btree_map(
        prop_oneof![Just("sex"), Just("age"), Just("smoker")].prop_map(String::from),
        arb_scalar(),
        0..=3,
    )
}
