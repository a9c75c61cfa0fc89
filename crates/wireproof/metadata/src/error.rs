//! Metadata model error types
//!
//! A malformed metadata document is the only session-fatal error class in
//! the core: no verification attempt can be constructed without a valid
//! type model.

use thiserror::Error;

/// Errors raised while building the metadata model.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The document is not well-formed XML
    #[error("malformed metadata: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The document is well-formed but violates a required structural
    /// constraint of the metadata format
    #[error("malformed metadata: {reason}")]
    Structure { reason: String },
}

impl MetadataError {
    pub fn structure(reason: impl Into<String>) -> Self {
        Self::Structure {
            reason: reason.into(),
        }
    }
}

/// Convenience result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;
