//! Session and message identity types.
//!
//! Session ids are human-scannable and embed the time the session was
//! started. Message ids are opaque UUIDs attached to every queued event so a
//! delivered batch can be reconciled against the queue item by item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";
const SUFFIX_LEN: usize = 8;

/// Session ID for tracking host application sessions.
///
/// Format: `sr-YYYYMMDD-HHMMSS-XXXXXXXX`
/// Example: `sr-20260115-143022-a7xqk2mf`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Length of a well-formed session id.
    pub const LEN: usize = 3 + 8 + 1 + 6 + 1 + SUFFIX_LEN;

    /// Generate a new session ID stamped with the current wall clock.
    pub fn new() -> Self {
        Self::generate(Utc::now())
    }

    /// Generate a new session ID stamped with `started_at`.
    pub fn generate(started_at: DateTime<Utc>) -> Self {
        SessionId(format!(
            "sr-{}-{}-{}",
            started_at.format("%Y%m%d"),
            started_at.format("%H%M%S"),
            generate_base32_suffix()
        ))
    }

    /// Parse an existing session ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != Self::LEN || !s.is_ascii() {
            return None;
        }
        let bytes = s.as_bytes();
        if !s.starts_with("sr-") || bytes[11] != b'-' || bytes[18] != b'-' {
            return None;
        }
        let date = &s[3..11];
        let time = &s[12..18];
        let suffix = &s[19..];
        if !date.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(SessionId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of one queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub uuid::Uuid);

impl MessageId {
    pub fn new() -> Self {
        MessageId(uuid::Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    // 40 random bits -> 8 base32 characters
    let mut value: u64 = 0;
    for byte in &bytes[..5] {
        value = (value << 8) | u64::from(*byte);
    }
    let mut out = String::with_capacity(SUFFIX_LEN);
    for i in (0..SUFFIX_LEN).rev() {
        let idx = ((value >> (i * 5)) & 0x1F) as usize;
        out.push(BASE32_ALPHABET[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_id_format() {
        let sid = SessionId::new();
        assert!(sid.0.starts_with("sr-"));
        assert_eq!(sid.0.len(), SessionId::LEN);
    }

    #[test]
    fn test_session_id_embeds_start_time() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 14, 30, 22).unwrap();
        let sid = SessionId::generate(at);
        assert!(sid.0.starts_with("sr-20260115-143022-"));
    }

    #[test]
    fn test_session_id_parse_roundtrip() {
        let sid = SessionId::new();
        assert_eq!(SessionId::parse(sid.as_str()), Some(sid));
    }

    #[test]
    fn test_session_id_parse_rejects_malformed() {
        assert!(SessionId::parse("").is_none());
        assert!(SessionId::parse("xx-20260115-143022-a7xq").is_none());
        assert!(SessionId::parse("sr-2026011x-143022-a7xqk2mf").is_none());
        assert!(SessionId::parse("sr-20260115-143022-A7XQK2MF").is_none());
        assert!(SessionId::parse("sr-20260115_143022-a7xqk2mf").is_none());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 14, 30, 22).unwrap();
        let a = SessionId::generate(at);
        let b = SessionId::generate(at);
        assert_ne!(a, b);
    }

    #[test]
    fn test_message_id_serializes_transparently() {
        let id = MessageId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
