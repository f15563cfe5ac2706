//! Core protocol and configuration types

use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};

/// On-disk daemon configuration
///
/// Loaded once from a fixed well-known path before the core starts and
/// immutable for the rest of the run. The only field the core reads is
/// the endpoint the signed payload must be bound to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
}

impl Config {
    /// Parse a config from its JSON text and validate its shape
    pub fn from_json(text: &str) -> SharedResult<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| SharedError::SerializationError {
                message: format!("Invalid config JSON: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// The endpoint must be a non-empty, well-formed URL
    pub fn validate(&self) -> SharedResult<()> {
        if self.endpoint.is_empty() || url::Url::parse(&self.endpoint).is_err() {
            return Err(SharedError::InvalidConfig {
                field: "endpoint".to_string(),
                value: self.endpoint.clone(),
            });
        }
        Ok(())
    }
}

/// The signed trigger payload carried by both transports
///
/// Deserialized from the raw trigger bytes only after the detached
/// signature over those exact bytes has verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedPayload {
    /// Signing time in milliseconds since the Unix epoch
    #[serde(rename = "timestamp")]
    pub timestamp_millis: i64,
    pub endpoint: String,
}

/// Which transport delivered a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Webhook,
    EmbeddedStream,
}

/// One inbound trigger, created fresh per request or line match and
/// consumed immediately by the validator
#[derive(Debug, Clone)]
pub struct TriggerAttempt {
    pub raw_body: Vec<u8>,
    pub signature: String,
    pub source: TriggerSource,
}

/// Stable reason codes for rejected triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidSignature,
    MalformedPayload,
    Expired,
    WrongEndpoint,
}

impl RejectReason {
    /// HTTP status the reason maps to, shared by both transports
    pub fn status(&self) -> u16 {
        match self {
            RejectReason::InvalidSignature => 403,
            RejectReason::MalformedPayload => 400,
            RejectReason::Expired => 401,
            RejectReason::WrongEndpoint => 403,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::InvalidSignature => "Invalid Signature",
            RejectReason::MalformedPayload => "Bad payload",
            RejectReason::Expired => "Signature too old",
            RejectReason::WrongEndpoint => "Signed request not intended for current endpoint",
        }
    }
}

/// A rejected trigger with its reason code and human message
///
/// Carries no secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: &'static str,
}

impl Rejection {
    pub fn new(reason: RejectReason) -> Self {
        Self {
            reason,
            message: reason.message(),
        }
    }

    pub fn status(&self) -> u16 {
        self.reason.status()
    }
}

/// The validator's trust decision for one trigger attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn rejected(reason: RejectReason) -> Self {
        ValidationOutcome::Rejected(Rejection::new(reason))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }
}

/// JSON response written to the child's stdin on the embedded stream,
/// newline terminated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamResponse {
    pub body: String,
    pub status: u16,
}

impl StreamResponse {
    /// Response for an accepted trigger
    pub fn ok() -> Self {
        Self {
            body: "OK".to_string(),
            status: 200,
        }
    }
}

impl From<&ValidationOutcome> for StreamResponse {
    fn from(outcome: &ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Accepted => StreamResponse::ok(),
            ValidationOutcome::Rejected(rejection) => StreamResponse {
                body: rejection.message.to_string(),
                status: rejection.status(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_accepts_well_formed_url() {
        let config = Config::from_json(r#"{"endpoint":"https://example.repl.co/refresh"}"#);
        assert_eq!(config.unwrap().endpoint, "https://example.repl.co/refresh");
    }

    #[test]
    fn config_rejects_empty_endpoint() {
        assert!(Config::from_json(r#"{"endpoint":""}"#).is_err());
    }

    #[test]
    fn config_rejects_non_url_endpoint() {
        assert!(Config::from_json(r#"{"endpoint":"not a url"}"#).is_err());
    }

    #[test]
    fn config_rejects_malformed_json() {
        assert!(Config::from_json("{").is_err());
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let payload: SignedPayload =
            serde_json::from_str(r#"{"timestamp":1700000000000,"endpoint":"https://a.example"}"#)
                .unwrap();
        assert_eq!(payload.timestamp_millis, 1_700_000_000_000);
    }

    #[test]
    fn reject_reasons_map_to_stable_statuses() {
        assert_eq!(RejectReason::InvalidSignature.status(), 403);
        assert_eq!(RejectReason::MalformedPayload.status(), 400);
        assert_eq!(RejectReason::Expired.status(), 401);
        assert_eq!(RejectReason::WrongEndpoint.status(), 403);
    }

    #[test]
    fn stream_response_reflects_outcome() {
        let ok = StreamResponse::from(&ValidationOutcome::Accepted);
        assert_eq!(ok, StreamResponse::ok());

        let rejected =
            StreamResponse::from(&ValidationOutcome::rejected(RejectReason::Expired));
        assert_eq!(rejected.status, 401);
        assert_eq!(rejected.body, "Signature too old");
    }
}
