//! Daemon-specific error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to start child process '{program}': {source}")]
    ProcessStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to kill child process: {message}")]
    ProcessTerminate { message: String },

    #[error("'{step}' failed")]
    Update { step: String },

    #[error("Embedded stream protocol error: {message}")]
    StreamProtocol { message: String },

    #[error("HTTP server error: {message}")]
    ServerStartup { message: String },

    #[error("Shared component error")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DaemonError {
    pub fn config(message: impl Into<String>) -> Self {
        DaemonError::Configuration {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        DaemonError::StreamProtocol {
            message: message.into(),
        }
    }
}

pub type DaemonResult<T> = Result<T, DaemonError>;
