//! Shared logging utilities for consistent tracing setup

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise the supplied level (or "info")
/// applies to the whole process.
pub fn init_tracing(level: Option<&str>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn log_startup(component: &str) {
    info!("🚀 Starting {}", component);
}

pub fn log_shutdown(reason: &str) {
    info!("🛑 Shutting down: {}", reason);
}
