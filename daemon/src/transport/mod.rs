//! Trigger-delivery transports
//!
//! Exactly one transport is active per run: the webhook listener when
//! the daemon runs standalone, otherwise the embedded-stream scanner
//! riding the child's own stdout/stdin.

pub mod http;
pub mod stdio;

pub use http::WebhookTransport;
pub use stdio::EmbeddedStreamTransport;
