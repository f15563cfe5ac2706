//! Trigger payload validation
//!
//! Turns an opaque `(signature, raw body)` pair into a trust decision.
//! The signature is a base64-encoded RSA PKCS#1 v1.5 signature over the
//! SHA-256 digest of the raw body exactly as received; the body itself
//! is only parsed after the signature verifies. Check order is part of
//! the contract: signature, then payload shape, then freshness, then
//! endpoint binding.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use shared::{Config, RejectReason, SignedPayload, TriggerAttempt, ValidationOutcome};

use crate::error::{DaemonError, DaemonResult};

/// Payloads older than this are rejected. Future-dated payloads are
/// accepted: only the lower bound is enforced.
pub const FRESHNESS_WINDOW_MILLIS: i64 = 15_000;

/// The fixed public half of the deploy signing key
pub const PUBLIC_KEY_PEM: &str = "-----BEGIN RSA PUBLIC KEY-----
MIIECgKCBAEAswkDXZlAqW1UpGiLFBW1ohSvUIqqcwrOt1ubbWrltrYT+3SQV24C
Su9j93+DX9tsFBuVDE3DSutddBmdWh0zFxDdSO+uA8JBJki9GfHNoynFcPLl3AxA
4iUh6nD6uSdXIGkJaJ+U8/Jix2AXS7Qk5Jfoktx88GtKoHAwznmfxdJwrFeiX8D8
Lqh34enh7pnntMp0vrpiTHu37H/VPGEAWkFoHuQMLoaHPgzF/Nk8NsjL2Uzvp8+Z
Vda8cXk2DeEm0x4q6kCWwchEcZF2jHcARjQ7ov7Vh5qZzlXcODt6i7NWUFX5h6g4
IodZXteh9apPaWSwXuMO+vCM3peYYfpFgVf/u2rh+wH6PjDiZE+keoA2PkPfvxVg
BUL54z6EYMR5pItN5MIqFigqBqUcrmoQhtwMZyU/bAVjqTjXa1pyE1wn18h1ufFf
6WXY/poVnmru+iA6IYG/D5YAolombTfA9U74qF1LWCIkahoNKjtX7cHRFDRT9OCo
inCiWiVG9WAbxMDU08j1CEut/yXhpSx8J4p878+LMapFChs7yIYV6TDS5UELKtBz
Ij6XWQKzT/PtwCYTxlZ+PlgMQw5ybG2imFzFy7JJpADkgWHGIn2j7Gzqo+DxcVC4
lotNBlZQTy5SVq+x6KwdJPG9+a6ECSiv7W+yyBh8QBPcC7oJAFdngSuvaE12TZvO
myRA05TX/Ron4/s0FbMrrP2K4oSuaCX6WlGcHcLNXz8OX0Egzyg3KKh5umzH8Ce9
ORoPwubbzXfZpbUGQb+iF8GPEp14z7VsDivjvzB/gaDqZ6+wSnPR6U+dk4SmP+Uk
/4Dc6ICxqct/BJOTMm9Fagp5mRcjXrTJ2TM+1ZKd/8lwL+gdcEYiNbb65d0ESN/1
qFWcjdihPqKjmn/5+PUdSl+wYfdbfnaT6fL01cOm/3xRS3l2A+9G5Bfh0PCdrg+A
+qKkGUp9cRD1w53ZS3zv/AmhY5e1VPc3mggpGn3uSseAc1NY5facH8ziiNfXLhQp
mjnOO5EsSjiXBXJ4uBisAbtiAaYELXYHOR1qf8catdI7jyUplCMpmqKT5ebUuhyh
6IP54Zx0YPznqwJSKJrPDoIxiD7iePQq0tOhxnMfGT8xeDZkTZ9sdgzbyqOnthX3
PUN9Kexr5nSWWfb0AJRTaZBxiXx4SKdo2yw6aaoIAOo6SyJLm0u0Qwa5Xm7GG0NS
0LsYDDPt/NNu+0tztpJM5DU6eRKePj9Lx8Xn8Hku3HqVR2LleSIyk7Z0G5yTZwdM
+9P0tsivT3+qKNy4BGin8mSBOCixhrL2YnNK5pOHrCXot562HTFKgvYz35u6sS6L
yggLIsW8CUnOIhj0AKovh9OvyC//N/GRLQIDAQAB
-----END RSA PUBLIC KEY-----";

/// Validates trigger signatures and payloads
///
/// Constructed once at startup and shared by reference into whichever
/// transport is active. Pure apart from reading the wall clock.
pub struct PayloadValidator {
    public_key: RsaPublicKey,
    endpoint: String,
}

impl PayloadValidator {
    pub fn new(public_key: RsaPublicKey, endpoint: String) -> Self {
        Self {
            public_key,
            endpoint,
        }
    }

    /// Build a validator around the embedded deploy public key
    pub fn from_embedded_key(config: &Config) -> DaemonResult<Self> {
        let public_key = RsaPublicKey::from_pkcs1_pem(PUBLIC_KEY_PEM)
            .map_err(|e| DaemonError::config(format!("Couldn't parse public key: {e}")))?;
        Ok(Self::new(public_key, config.endpoint.clone()))
    }

    /// Validate one trigger against the current wall clock
    pub fn validate(&self, signature: &str, raw_body: &[u8]) -> ValidationOutcome {
        self.validate_at(signature, raw_body, now_millis())
    }

    pub fn validate_attempt(&self, attempt: &TriggerAttempt) -> ValidationOutcome {
        self.validate(&attempt.signature, &attempt.raw_body)
    }

    /// Validation against an explicit clock reading, deterministic for
    /// a fixed key, endpoint, and input
    fn validate_at(&self, signature: &str, raw_body: &[u8], now_millis: i64) -> ValidationOutcome {
        let decoded = match BASE64.decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return ValidationOutcome::rejected(RejectReason::InvalidSignature),
        };

        let digest = Sha256::digest(raw_body);
        if self
            .public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &decoded)
            .is_err()
        {
            return ValidationOutcome::rejected(RejectReason::InvalidSignature);
        }

        let payload: SignedPayload = match serde_json::from_slice(raw_body) {
            Ok(payload) => payload,
            Err(_) => return ValidationOutcome::rejected(RejectReason::MalformedPayload),
        };

        // Lower bound only: a payload timestamped in the future passes.
        if payload.timestamp_millis < now_millis - FRESHNESS_WINDOW_MILLIS {
            return ValidationOutcome::rejected(RejectReason::Expired);
        }

        if payload.endpoint != self.endpoint {
            return ValidationOutcome::rejected(RejectReason::WrongEndpoint);
        }

        ValidationOutcome::Accepted
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use shared::Rejection;

    const ENDPOINT: &str = "https://app.example.com/refresh";
    const NOW: i64 = 1_700_000_000_000;

    fn reason(outcome: ValidationOutcome) -> RejectReason {
        match outcome {
            ValidationOutcome::Rejected(Rejection { reason, .. }) => reason,
            ValidationOutcome::Accepted => panic!("expected rejection"),
        }
    }

    #[test]
    fn fresh_payload_for_configured_endpoint_is_accepted() {
        let validator = validator_for(ENDPOINT);
        let body = payload_json(NOW, ENDPOINT);
        let outcome = validator.validate_at(&sign(&body), &body, NOW);
        assert!(outcome.is_accepted());
    }

    #[test]
    fn validation_is_deterministic() {
        let validator = validator_for(ENDPOINT);
        let body = payload_json(NOW, ENDPOINT);
        let signature = sign(&body);
        let first = validator.validate_at(&signature, &body, NOW);
        let second = validator.validate_at(&signature, &body, NOW);
        assert_eq!(first, second);
    }

    #[test]
    fn flipped_body_byte_invalidates_signature() {
        let validator = validator_for(ENDPOINT);
        let body = payload_json(NOW, ENDPOINT);
        let signature = sign(&body);

        let mut tampered = body.clone();
        tampered[0] ^= 0x01;
        let outcome = validator.validate_at(&signature, &tampered, NOW);
        assert_eq!(reason(outcome), RejectReason::InvalidSignature);
    }

    #[test]
    fn undecodable_signature_is_rejected_as_invalid() {
        let validator = validator_for(ENDPOINT);
        let body = payload_json(NOW, ENDPOINT);
        let outcome = validator.validate_at("not-base64!!!", &body, NOW);
        assert_eq!(reason(outcome), RejectReason::InvalidSignature);
    }

    #[test]
    fn signed_non_payload_body_is_malformed() {
        let validator = validator_for(ENDPOINT);
        let body = b"{\"not\":\"a payload\"}".to_vec();
        let outcome = validator.validate_at(&sign(&body), &body, NOW);
        assert_eq!(reason(outcome), RejectReason::MalformedPayload);
    }

    #[test]
    fn freshness_boundary_sits_at_fifteen_seconds() {
        let validator = validator_for(ENDPOINT);

        let stale = payload_json(NOW - 16_000, ENDPOINT);
        let outcome = validator.validate_at(&sign(&stale), &stale, NOW);
        assert_eq!(reason(outcome), RejectReason::Expired);

        let fresh = payload_json(NOW - 14_000, ENDPOINT);
        let outcome = validator.validate_at(&sign(&fresh), &fresh, NOW);
        assert!(outcome.is_accepted());
    }

    #[test]
    fn future_timestamp_is_not_rejected() {
        let validator = validator_for(ENDPOINT);
        let body = payload_json(NOW + 60_000, ENDPOINT);
        let outcome = validator.validate_at(&sign(&body), &body, NOW);
        assert!(outcome.is_accepted());
    }

    #[test]
    fn wrong_endpoint_is_rejected_even_when_fresh() {
        let validator = validator_for(ENDPOINT);
        let body = payload_json(NOW, "https://other.example.com/refresh");
        let outcome = validator.validate_at(&sign(&body), &body, NOW);
        assert_eq!(reason(outcome), RejectReason::WrongEndpoint);
    }

    #[test]
    fn freshness_is_checked_before_endpoint() {
        let validator = validator_for(ENDPOINT);
        let body = payload_json(NOW - 16_000, "https://other.example.com/refresh");
        let outcome = validator.validate_at(&sign(&body), &body, NOW);
        assert_eq!(reason(outcome), RejectReason::Expired);
    }

    #[test]
    fn embedded_key_parses() {
        let config = Config {
            endpoint: ENDPOINT.to_string(),
        };
        assert!(PayloadValidator::from_embedded_key(&config).is_ok());
    }
}
