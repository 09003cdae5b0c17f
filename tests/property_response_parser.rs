//! Property tests for the structured-response parser and scenario fingerprints.

use proptest::prelude::*;
use serde_json::{Map, Value};

use dialogue_miner::domain::models::scenario_fingerprint;
use dialogue_miner::services::response_parser::parse;

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-zA-Z0-9 .,!?'-]{0,30}".prop_map(Value::String),
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

fn record_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z_]{1,12}", value_strategy(), 0..6)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Prose that cannot open a record or a code fence.
fn prose_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z ,.:]{0,40}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn bare_json_object_is_recovered(record in record_strategy()) {
        let text = serde_json::to_string(&record).unwrap();
        prop_assert_eq!(parse(&text), Some(record));
    }

    #[test]
    fn object_embedded_in_prose_is_recovered(
        record in record_strategy(),
        before in prose_strategy(),
        after in prose_strategy(),
    ) {
        let text = format!("{before}{}{after}", serde_json::to_string(&record).unwrap());
        prop_assert_eq!(parse(&text), Some(record));
    }

    #[test]
    fn fenced_object_is_recovered(
        record in record_strategy(),
        before in prose_strategy(),
        after in prose_strategy(),
    ) {
        let body = serde_json::to_string_pretty(&record).unwrap();
        let text = format!("{before}\n```json\n{body}\n```\n{after}");
        prop_assert_eq!(parse(&text), Some(record));
    }

    #[test]
    fn text_without_an_opening_brace_is_plain(text in "[^{]{0,200}") {
        prop_assert_eq!(parse(&text), None);
    }

    #[test]
    fn parse_never_panics(text in ".{0,300}") {
        let _ = parse(&text);
    }

    #[test]
    fn unbalanced_braces_never_panic(text in "[{}\\[\\]'\":, a-z0-9]{0,120}") {
        let _ = parse(&text);
    }

    #[test]
    fn fingerprint_is_stable_hex(intent in ".{0,60}", term in ".{0,30}") {
        let first = scenario_fingerprint(&intent, &term);
        prop_assert_eq!(first.len(), 16);
        prop_assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert_eq!(first, scenario_fingerprint(&intent, &term));
    }

    #[test]
    fn distinct_pairs_have_distinct_fingerprints(
        a in "[a-z ]{1,20}",
        b in "[a-z ]{1,20}",
        c in "[a-z ]{1,20}",
        d in "[a-z ]{1,20}",
    ) {
        prop_assume!((&a, &b) != (&c, &d));
        prop_assert_ne!(scenario_fingerprint(&a, &b), scenario_fingerprint(&c, &d));
    }
}

#[test]
fn test_field_boundary_is_part_of_fingerprint() {
    assert_ne!(
        scenario_fingerprint("ab", "c"),
        scenario_fingerprint("a", "bc")
    );
}
