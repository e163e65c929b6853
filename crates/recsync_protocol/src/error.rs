//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire documents.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The document is not valid JSON or does not match the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but violates a structural rule.
    #[error("invalid document: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}
