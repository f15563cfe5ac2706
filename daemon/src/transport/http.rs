//! Webhook transport
//!
//! Exposes a single HTTP endpoint that accepts POST bodies as trigger
//! material. The restart sequence runs synchronously inside the request
//! handler while the coordinator mutex is held, so overlapping trigger
//! requests serialize: a 200 means the update sequence was invoked, not
//! that the new child is healthy.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use shared::{TriggerAttempt, TriggerSource, ValidationOutcome};

use crate::coordinator::UpdateCoordinator;
use crate::error::{DaemonError, DaemonResult};
use crate::services::StdioMode;
use crate::traits::Updater;
use crate::validator::PayloadValidator;

pub const REFRESH_PATH: &str = "/refresh";
pub const SIGNATURE_HEADER: &str = "Signature";
pub const DEFAULT_PORT: u16 = 8090;

struct AppState<U: Updater> {
    validator: Arc<PayloadValidator>,
    coordinator: Arc<Mutex<UpdateCoordinator<U>>>,
}

impl<U: Updater> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

pub struct WebhookTransport<U: Updater + 'static> {
    state: AppState<U>,
    addr: SocketAddr,
}

impl<U: Updater + 'static> WebhookTransport<U> {
    pub fn new(
        addr: SocketAddr,
        validator: Arc<PayloadValidator>,
        coordinator: Arc<Mutex<UpdateCoordinator<U>>>,
    ) -> Self {
        Self {
            state: AppState {
                validator,
                coordinator,
            },
            addr,
        }
    }

    /// Build the Axum router with the refresh route
    pub fn build_router(&self) -> Router {
        Router::new()
            .route(REFRESH_PATH, post(refresh::<U>))
            .with_state(self.state.clone())
    }

    /// Bind and serve until the listener fails; never returns Ok
    pub async fn run(self) -> DaemonResult<()> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| DaemonError::ServerStartup {
                message: format!("Failed to bind to {}: {}", self.addr, e),
            })?;

        info!(
            "🌐 Listening for redeploy events on http://{}{}",
            self.addr, REFRESH_PATH
        );

        axum::serve(listener, router)
            .await
            .map_err(|e| DaemonError::ServerStartup {
                message: e.to_string(),
            })?;

        Err(DaemonError::ServerStartup {
            message: "HTTP server exited unexpectedly".to_string(),
        })
    }
}

async fn refresh<U: Updater + 'static>(
    State(state): State<AppState<U>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    // No credentials at all is distinct from a failed validation.
    let signature = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(signature) => signature.to_string(),
        None => return (StatusCode::UNAUTHORIZED, "Missing Signature".to_string()),
    };

    let attempt = TriggerAttempt {
        raw_body: body.to_vec(),
        signature,
        source: TriggerSource::Webhook,
    };

    match state.validator.validate_attempt(&attempt) {
        ValidationOutcome::Rejected(rejection) => {
            warn!("Signature validation failed for an event, so listeners will not be called");
            let status = StatusCode::from_u16(rejection.status())
                .unwrap_or(StatusCode::FORBIDDEN);
            (status, rejection.message.to_string())
        }
        ValidationOutcome::Accepted => {
            info!("Signature validation successful, restarting program");
            let mut coordinator = state.coordinator.lock().await;
            match coordinator.run_update_and_restart(StdioMode::Attached).await {
                // "OK" is only written when the restart handler fails; a
                // clean restart answers with an empty 200. Documented
                // contract, kept as observed.
                Err(e) => {
                    error!("Restart handler failed: {}", e);
                    (StatusCode::OK, "OK".to_string())
                }
                Ok(()) => (StatusCode::OK, String::new()),
            }
        }
    }
}
