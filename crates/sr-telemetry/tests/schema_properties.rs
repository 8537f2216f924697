//! Property-based tests for schema extraction and the bounded queue.

use chrono::Utc;
use proptest::prelude::*;
use serde_json::{Map, Value};
use sr_telemetry::{
    extract_schema, EventQueue, QueuedEvent, SchemaEntry, SchemaExtractor, TypeTag, MAX_QUEUE_LEN,
};

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e6..1.0e6f64).prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::String),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn arb_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::vec(("[a-z]{1,6}", arb_value()), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

fn depth(entries: &[SchemaEntry]) -> usize {
    entries
        .iter()
        .map(|e| 1 + e.children.as_deref().map(depth).unwrap_or(0))
        .max()
        .unwrap_or(0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Extraction is deterministic.
    #[test]
    fn extraction_is_idempotent(object in arb_object()) {
        let value = Value::Object(object);
        let first = extract_schema(&value).unwrap();
        let second = extract_schema(&value).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Top-level entries mirror the input keys, in order.
    #[test]
    fn top_level_names_follow_input(object in arb_object()) {
        let keys: Vec<String> = object.keys().cloned().collect();
        let schema = extract_schema(&Value::Object(object)).unwrap();
        let names: Vec<String> = schema.into_iter().map(|e| e.property_name).collect();
        prop_assert_eq!(names, keys);
    }

    /// Containers always carry children; scalars never do.
    #[test]
    fn children_only_on_containers(object in arb_object()) {
        fn check(entries: &[SchemaEntry]) -> bool {
            entries.iter().all(|e| match e.property_type {
                TypeTag::List | TypeTag::Object => {
                    e.children.as_deref().map(check).unwrap_or(false)
                }
                _ => e.children.is_none(),
            })
        }
        let schema = extract_schema(&Value::Object(object)).unwrap();
        prop_assert!(check(&schema));
    }

    /// A successful extraction never exceeds the configured depth.
    #[test]
    fn depth_limit_is_respected(object in arb_object(), limit in 1usize..6) {
        match SchemaExtractor::new(limit).extract(&Value::Object(object)) {
            Ok(schema) => prop_assert!(depth(&schema) <= limit),
            Err(e) => prop_assert!(e.to_string().contains(&limit.to_string())),
        }
    }

    /// The queue never grows past its cap and keeps the newest events.
    #[test]
    fn queue_stays_bounded(extra in 0usize..50) {
        let mut queue = EventQueue::new();
        let total = MAX_QUEUE_LEN + extra;
        for i in 0..total {
            queue.push_bounded(QueuedEvent::event_schema(format!("e{i}"), vec![], Utc::now()));
            prop_assert!(queue.len() <= MAX_QUEUE_LEN);
        }
        let first = queue.iter().next().cloned();
        let expected = format!("e{}", total - MAX_QUEUE_LEN);
        prop_assert!(matches!(
            first,
            Some(QueuedEvent::EventSchema { ref event_name, .. }) if *event_name == expected
        ), "oldest retained event should be {}", expected);
    }
}
