//! Parse errors.

use thiserror::Error;

/// Why a procedure document was rejected.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The document is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(String),

    /// The document is valid JSON but not a valid procedure.
    #[error("{0}")]
    Structure(String),

    /// A referenced file could not be read.
    #[error("could not read [{path}]: {reason}")]
    Io {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        reason: String,
    },
}
