//! Error types for the engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur inside the monitoring engine.
///
/// None of these are fatal to the process except `NoSpacesDiscovered`, which
/// only fires when the configuration backend is unreachable at startup.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Backend error: {0}")]
    Backend(#[from] costwatch_backend::BackendError),

    #[error("Analysis of space {space} failed: {message}")]
    SpaceAnalysis { space: String, message: String },

    #[error("Hook {hook} failed for unit {unit}: {message}")]
    Hook {
        hook: String,
        unit: String,
        message: String,
    },

    #[error("No spaces discoverable; configuration backend unreachable: {0}")]
    NoSpacesDiscovered(String),

    #[error("Invalid engine configuration: {0}")]
    Config(String),

    #[error("Analysis task panicked: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
