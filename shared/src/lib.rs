//! Shared types for the redeploy daemon
//!
//! Contains only the types that cross a process or protocol boundary:
//! the signed trigger payload and its validation outcome, the JSON
//! response written back over the embedded stream, and the on-disk
//! configuration shape. Daemon-internal types live in the daemon crate.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::{SharedError, SharedResult};
pub use types::{
    Config, RejectReason, Rejection, SignedPayload, StreamResponse, TriggerAttempt, TriggerSource,
    ValidationOutcome,
};
