//! Error types for the backend clients.

use thiserror::Error;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur talking to external collaborators.
///
/// All of these are transient from the engine's viewpoint: the failing call
/// is retried on the next scheduled tick, never in a tight loop.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Unknown space: {0}")]
    UnknownSpace(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Request(e.to_string())
        }
    }
}
