//! One-time credential handoffs.
//!
//! After a login or install flow completes in the browser, the
//! credential is parked under `{service}_{otp}` so the extension
//! polling from inside the editor can pick it up exactly once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a parked credential stays redeemable.
pub const HANDOFF_TTL_MINUTES: i64 = 10;

/// A parked credential waiting to be redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRecord {
    /// Partition key, built by [`handoff_id`].
    pub id: String,
    /// Opaque credential payload being handed across.
    pub auth: String,
    /// When the record was written.
    pub date: DateTime<Utc>,
}

/// Key for a parked credential: `{service}_{otp}`.
pub fn handoff_id(service: &str, otp: &str) -> String {
    format!("{service}_{otp}")
}

/// A record older than [`HANDOFF_TTL_MINUTES`] can no longer be
/// redeemed, only cleaned up.
pub fn is_expired(record: &HandoffRecord, now: DateTime<Utc>) -> bool {
    now > record.date + Duration::minutes(HANDOFF_TTL_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: DateTime<Utc>) -> HandoffRecord {
        HandoffRecord {
            id: handoff_id("google-calendar", "abc123"),
            auth: "{\"token\":\"t\"}".to_string(),
            date,
        }
    }

    #[test]
    fn handoff_id_joins_service_and_otp() {
        assert_eq!(handoff_id("google-calendar", "abc123"), "google-calendar_abc123");
    }

    #[test]
    fn is_expired_returns_false_within_ttl() {
        let now = Utc::now();
        assert!(!is_expired(&record(now - Duration::minutes(9)), now));
    }

    #[test]
    fn is_expired_returns_false_at_exact_ttl() {
        let now = Utc::now();
        assert!(!is_expired(&record(now - Duration::minutes(HANDOFF_TTL_MINUTES)), now));
    }

    #[test]
    fn is_expired_returns_true_past_ttl() {
        let now = Utc::now();
        assert!(is_expired(&record(now - Duration::minutes(11)), now));
    }
}
