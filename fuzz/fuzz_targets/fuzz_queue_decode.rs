//! Fuzz target for decoding a persisted event queue.
//!
//! A stored queue may be truncated or hand-edited; decoding must fail
//! cleanly, and a decoded queue must survive the bound and re-encode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sr_telemetry::{EventQueue, MAX_QUEUE_LEN};

fuzz_target!(|data: &[u8]| {
    if let Ok(mut queue) = serde_json::from_slice::<EventQueue>(data) {
        queue.truncate_front(MAX_QUEUE_LEN);
        assert!(queue.len() <= MAX_QUEUE_LEN);
        let _ = serde_json::to_vec(&queue);
    }
});
