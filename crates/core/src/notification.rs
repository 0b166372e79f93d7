//! The notification record and its storage encoding.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{NotificationId, Timestamp};

/// Last id handed out by [`next_id`], in nanoseconds since the Unix epoch.
static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// A notification as stored in a sequence and published on the bus.
///
/// The JSON encoding of this struct is the storage format and the bus
/// payload; field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub message: String,
    pub verified: bool,
    /// Creation instant. Verification does not change it.
    pub timestamp: Timestamp,
}

impl NotificationRecord {
    /// Create a fresh, unverified record stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            message: message.into(),
            verified: false,
            timestamp: Utc::now(),
        }
    }

    /// Return a copy of this record with `verified` set.
    pub fn into_verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Serialize to the storage / bus form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored entry.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Generate a new notification id.
///
/// Ids are the wall clock in nanoseconds, bumped past the previous id when
/// the clock has not advanced (or went backwards), so ids handed out by one
/// process are strictly increasing.
pub fn next_id() -> NotificationId {
    let now = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| LAST_ID.load(Ordering::Relaxed) + 1);

    let mut prev = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(prev + 1);
        match LAST_ID.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return candidate.to_string(),
            Err(actual) => prev = actual,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn new_record_is_unverified_with_id() {
        let record = NotificationRecord::new("hello");
        assert_eq!(record.message, "hello");
        assert!(!record.verified);
        assert!(!record.id.is_empty());
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let ids: Vec<i64> = (0..1000)
            .map(|_| next_id().parse().expect("numeric id"))
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| next_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("thread panicked") {
                assert!(seen.insert(id), "duplicate id generated");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn into_verified_keeps_identity_and_timestamp() {
        let record = NotificationRecord::new("check");
        let verified = record.clone().into_verified();
        assert!(verified.verified);
        assert_eq!(verified.id, record.id);
        assert_eq!(verified.message, record.message);
        assert_eq!(verified.timestamp, record.timestamp);
    }

    #[test]
    fn encoding_uses_wire_field_names() {
        let record = NotificationRecord::new("wire");
        let raw = record.encode().expect("encode");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");

        assert_eq!(value["id"], record.id.as_str());
        assert_eq!(value["message"], "wire");
        assert_eq!(value["verified"], false);
        assert!(value["timestamp"].is_string());
        assert_eq!(NotificationRecord::decode(&raw).expect("decode"), record);
    }

    #[test]
    fn decode_accepts_records_written_by_other_clients() {
        let raw = r#"{"id":"1700000000000000000","message":"m","verified":true,"timestamp":"2024-01-02T03:04:05.123456789+01:00"}"#;
        let record = NotificationRecord::decode(raw).expect("decode");
        assert_eq!(record.id, "1700000000000000000");
        assert!(record.verified);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(NotificationRecord::decode("not json").is_err());
        assert!(NotificationRecord::decode(r#"{"id":1}"#).is_err());
    }
}
