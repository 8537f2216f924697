//! Reading event payloads from files or stdin.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

/// Path argument that selects stdin.
pub const STDIN_PATH: &str = "-";

/// Read one JSON payload from `path`, or from stdin when it is `-`.
pub fn read_payload(path: &Path) -> sr_common::Result<Value> {
    let raw = if path == Path::new(STDIN_PATH) {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    parse_payload(&raw)
}

/// Parse a JSON payload. Blank input reads as `null`.
pub fn parse_payload(raw: &str) -> sr_common::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(raw)?)
}
