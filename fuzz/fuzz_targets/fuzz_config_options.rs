//! Fuzz target for options file parsing.
//!
//! Tests that options parsing and resolution handle arbitrary input
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sr_config::{InspectorConfig, InspectorOptions};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(options) = InspectorOptions::from_json(text) {
        let _ = InspectorConfig::resolve(options);
    }
});
