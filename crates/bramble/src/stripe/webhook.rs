//! Checkout webhook signature verification.
//!
//! Stripe signs each delivery with the endpoint's secret and sends a
//! `stripe-signature` header of the form `t=<unix>,v1=<hmac>`. The
//! signed payload is `{t}.{raw body}`, so the body must be verified
//! before it is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::StripeError;

/// Deliveries with a timestamp drifting further than this many seconds
/// from the server clock are rejected as replays.
const TOLERANCE_SECONDS: i64 = 300;

/// Verify a webhook delivery against the endpoint secret.
pub fn verify_signature(payload: &str, header: &str, secret: &str) -> Result<(), StripeError> {
    verify_at(payload, header, secret, chrono::Utc::now().timestamp())
}

fn verify_at(payload: &str, header: &str, secret: &str, now: i64) -> Result<(), StripeError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let Some(timestamp) = timestamp else {
        return Err(StripeError::Signature(
            "Unable to extract timestamp and signatures from header".to_string(),
        ));
    };
    if signatures.is_empty() {
        return Err(StripeError::Signature(
            "No signatures found with expected scheme".to_string(),
        ));
    }

    let signed_payload = format!("{timestamp}.{payload}");
    let valid = signatures.iter().any(|signature| {
        let Ok(decoded) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(signed_payload.as_bytes());
        mac.verify_slice(&decoded).is_ok()
    });
    if !valid {
        return Err(StripeError::Signature(
            "No signatures found matching the expected signature for payload".to_string(),
        ));
    }

    if (now - timestamp).abs() > TOLERANCE_SECONDS {
        return Err(StripeError::Signature(
            "Timestamp outside the tolerance zone".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let header = sign("{\"livemode\":false}", "whsec_1", 1_700_000_000);
        assert!(verify_at("{\"livemode\":false}", &header, "whsec_1", 1_700_000_000).is_ok());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let header = sign("{\"livemode\":false}", "whsec_1", 1_700_000_000);
        let error =
            verify_at("{\"livemode\":true}", &header, "whsec_1", 1_700_000_000).unwrap_err();
        assert_eq!(
            error.to_string(),
            "No signatures found matching the expected signature for payload"
        );
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let header = sign("{}", "whsec_1", 1_700_000_000);
        assert!(verify_at("{}", &header, "whsec_2", 1_700_000_000).is_err());
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let header = sign("{}", "whsec_1", 1_700_000_000);
        let error = verify_at("{}", &header, "whsec_1", 1_700_000_000 + 301).unwrap_err();
        assert_eq!(error.to_string(), "Timestamp outside the tolerance zone");
    }

    #[test]
    fn accepts_drift_inside_the_tolerance() {
        let header = sign("{}", "whsec_1", 1_700_000_000);
        assert!(verify_at("{}", &header, "whsec_1", 1_700_000_000 + 299).is_ok());
    }

    #[test]
    fn rejects_headers_without_a_timestamp() {
        let error = verify_at("{}", "v1=abcd", "whsec_1", 0).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unable to extract timestamp and signatures from header"
        );
    }

    #[test]
    fn rejects_headers_without_signatures() {
        let error = verify_at("{}", "t=1700000000", "whsec_1", 1_700_000_000).unwrap_err();
        assert_eq!(error.to_string(), "No signatures found with expected scheme");
    }

    #[test]
    fn ignores_unknown_schemes_but_honors_v1() {
        let valid = sign("{}", "whsec_1", 1_700_000_000);
        let header = format!("{valid},v0=000000");
        assert!(verify_at("{}", &header, "whsec_1", 1_700_000_000).is_ok());
    }
}
