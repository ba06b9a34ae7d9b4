//! Opaque pagination cursors bound to a query fingerprint.
//!
//! A cursor is the URL-safe base64 encoding of a small JSON payload. It is
//! not cryptographically authenticated; tenant scope is enforced on every
//! request regardless of the cursor presented.

use activity_core::{ActivityError, ActivityResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Request field cursor errors are attributed to.
const CURSOR_FIELD: &str = "spec.continue";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPayload {
    /// Sort-key timestamp of the last returned row, in nanoseconds.
    #[serde(rename = "ts")]
    pub last_timestamp_nanos: i64,
    /// Sort-key record ID of the last returned row.
    #[serde(rename = "id")]
    pub last_record_id: String,
    /// Digest of the issuing query's normalized parameters.
    #[serde(rename = "fp")]
    pub fingerprint: String,
    #[serde(rename = "iat")]
    pub issued_at_unix: i64,
}

impl CursorPayload {
    /// The exclusive continuation position the payload encodes.
    pub fn position(&self) -> (DateTime<Utc>, String) {
        let ts = Utc.timestamp_nanos(self.last_timestamp_nanos);
        (ts, self.last_record_id.clone())
    }
}

/// Stable digest over normalized query parameters, excluding the cursor
/// itself and the limit. Parameters hash by name so reordering is
/// irrelevant; relative time expressions hash as written, which keeps a
/// `now-1h` cursor usable across its page walk.
pub fn fingerprint(parts: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = parts.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    for (key, value) in sorted {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    // First half of the digest is plenty for equality checking.
    hex(&digest[..16])
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Encoder/decoder with the TTL baked in.
#[derive(Debug, Clone)]
pub struct CursorCodec {
    ttl: Duration,
}

impl CursorCodec {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn encode(&self, payload: &CursorPayload) -> String {
        // Serialization of this payload shape cannot fail.
        let json = serde_json::to_vec(payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode and validate a presented cursor against the fingerprint of
    /// the accompanying query.
    pub fn decode(
        &self,
        token: &str,
        expected_fingerprint: &str,
        now: DateTime<Utc>,
    ) -> ActivityResult<CursorPayload> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ActivityError::invalid(CURSOR_FIELD, "malformed cursor"))?;
        let payload: CursorPayload = serde_json::from_slice(&bytes)
            .map_err(|_| ActivityError::invalid(CURSOR_FIELD, "malformed cursor"))?;

        let issued_at = Utc
            .timestamp_opt(payload.issued_at_unix, 0)
            .single()
            .ok_or_else(|| ActivityError::invalid(CURSOR_FIELD, "malformed cursor"))?;
        if issued_at + self.ttl < now {
            return Err(ActivityError::invalid(CURSOR_FIELD, "cursor expired"));
        }

        if payload.fingerprint != expected_fingerprint {
            return Err(ActivityError::invalid(
                CURSOR_FIELD,
                "cursor parameters changed",
            ));
        }

        Ok(payload)
    }

    /// Issue a cursor for the last returned row.
    pub fn issue(
        &self,
        last_timestamp: DateTime<Utc>,
        last_record_id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> String {
        self.encode(&CursorPayload {
            last_timestamp_nanos: last_timestamp.timestamp_nanos_opt().unwrap_or_default(),
            last_record_id: last_record_id.to_string(),
            fingerprint: fingerprint.to_string(),
            issued_at_unix: now.timestamp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> CursorCodec {
        CursorCodec::new(Duration::hours(1))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn encode_decode_round_trips() {
        let payload = CursorPayload {
            last_timestamp_nanos: now().timestamp_nanos_opt().unwrap(),
            last_record_id: "a-42".into(),
            fingerprint: "f".repeat(32),
            issued_at_unix: now().timestamp(),
        };
        let token = codec().encode(&payload);
        let decoded = codec().decode(&token, &payload.fingerprint, now()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn malformed_cursors_are_invalid() {
        for bad in ["not base64!!", "bm90IGpzb24", ""] {
            let err = codec().decode(bad, "fp", now()).unwrap_err();
            assert_eq!(err.status_code(), 422);
            assert!(err.to_string().contains("malformed cursor"));
        }
    }

    #[test]
    fn expired_cursor_is_rejected_past_ttl() {
        let fp = fingerprint(&[("filter", "verb == 'get'")]);
        let token = codec().issue(now(), "a-1", &fp, now());
        // Exactly at the TTL boundary the cursor still works.
        assert!(codec()
            .decode(&token, &fp, now() + Duration::seconds(3600))
            .is_ok());
        let err = codec()
            .decode(&token, &fp, now() + Duration::seconds(3601))
            .unwrap_err();
        assert!(err.to_string().contains("cursor expired"));
    }

    #[test]
    fn changed_query_parameters_are_rejected() {
        let fp = fingerprint(&[("filter", "verb == 'get'"), ("startTime", "now-1h")]);
        let token = codec().issue(now(), "a-1", &fp, now());
        let other = fingerprint(&[("filter", "verb == 'delete'"), ("startTime", "now-1h")]);
        let err = codec().decode(&token, &other, now()).unwrap_err();
        assert!(err.to_string().contains("cursor parameters changed"));
    }

    #[test]
    fn fingerprint_is_order_insensitive_and_skips_empty() {
        let a = fingerprint(&[("a", "1"), ("b", "2"), ("c", "")]);
        let b = fingerprint(&[("b", "2"), ("a", "1")]);
        assert_eq!(a, b);
        assert_ne!(a, fingerprint(&[("a", "1"), ("b", "3")]));
    }
}
