//! Fuzz target for schema extraction.
//!
//! Any JSON document must either yield a schema within the depth limit or
//! a typed error. Extraction must be deterministic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sr_telemetry::{SchemaEntry, SchemaExtractor};

#[derive(Arbitrary, Debug)]
struct Input {
    max_depth: u8,
    payload: Vec<u8>,
}

fn depth(entries: &[SchemaEntry]) -> usize {
    entries
        .iter()
        .map(|e| 1 + e.children.as_deref().map(depth).unwrap_or(0))
        .max()
        .unwrap_or(0)
}

fuzz_target!(|input: Input| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&input.payload) else {
        return;
    };
    let limit = usize::from(input.max_depth.max(1));
    let extractor = SchemaExtractor::new(limit);

    let first = extractor.extract(&value);
    if let Ok(schema) = &first {
        assert!(depth(schema) <= limit);
    }
    assert_eq!(first, extractor.extract(&value));
});
