//! Shared error types for the redeploy daemon

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Message protocol error: {message}")]
    ProtocolError { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
