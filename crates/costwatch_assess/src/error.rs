//! Error types for the assessment module.

use thiserror::Error;

/// Result type alias for assessment operations.
pub type AssessResult<T> = Result<T, AssessError>;

/// Errors that can occur while consulting the advisor.
///
/// Estimation and risk scoring never fail; everything here comes from the
/// optional AI collaborator.
#[derive(Error, Debug)]
pub enum AssessError {
    #[error("Advisor not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    AdvisorNotConfigured,

    #[error("Advisor request failed: {0}")]
    AdvisorRequest(String),

    #[error("Advisor API error {status}: {body}")]
    AdvisorStatus { status: u16, body: String },

    #[error("Advisor returned no content")]
    AdvisorEmpty,

    #[error("Advisor timed out after {0} seconds")]
    AdvisorTimeout(u64),
}
