//! Error types for tally-rc
//!
//! Network and server failures all collapse into `Unavailable`: the
//! controller treats them the same way (roll back, show a short message,
//! re-fetch). Only a request the server refused as invalid is `Validation`.

use thiserror::Error;

/// Result type for rating client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the request as invalid (HTTP 400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network failure, timeout, or server-side persistence failure
    #[error("Rating service unavailable: {0}")]
    Unavailable(String),

    /// A state store guard refused a write
    #[error("Write to '{path}' rejected: {reason}")]
    GuardRejected { path: String, reason: String },
}

impl ClientError {
    /// Whether a later retry may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Unavailable(_))
    }
}

impl From<tally_common::Error> for ClientError {
    fn from(err: tally_common::Error) -> Self {
        match err {
            tally_common::Error::Validation(msg) => ClientError::Validation(msg),
            other => ClientError::Unavailable(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Unavailable(err.to_string())
    }
}
