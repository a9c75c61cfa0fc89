//! Verifier error types
//!
//! These cover internal faults of the verifier itself. They never escape
//! a verification attempt: the attempt boundary converts them into a
//! `Failed` verdict (transport faults are the substance of `Failed`)
//! after cleanup has run.

use thiserror::Error;

/// Errors internal to the transactional verifier.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// HTTP transport error, timeouts included
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured service root is not a valid URL
    #[error("invalid service root: {0}")]
    Url(#[from] url::ParseError),

    /// A response body that had to be JSON was not
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for verifier operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
