//! Errors of the value model.

use thiserror::Error;

/// Why a value operation was refused.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum ValueError {
    /// Source and destination types are incompatible.
    #[error("type mismatch: expected <{expected}>, found <{found}>")]
    TypeMismatch {
        /// Name of the type the operation required.
        expected: String,
        /// Name of the type that was supplied.
        found: String,
    },

    /// A numeric conversion would lose the value.
    #[error("value [{value}] does not fit in <{target}>")]
    OutOfRange {
        /// Display form of the offending value.
        value: String,
        /// Name of the conversion target type.
        target: String,
    },

    /// A path pointed at a field or index that does not exist.
    #[error("no field at path [{0}]")]
    NoSuchField(String),

    /// A path string could not be parsed.
    #[error("malformed path [{0}]")]
    MalformedPath(String),

    /// A string representation could not be parsed into the requested type.
    #[error("could not parse [{input}] as <{target}>: {reason}")]
    ParseFailure {
        /// The input string.
        input: String,
        /// Name of the requested type.
        target: String,
        /// What went wrong.
        reason: String,
    },

    /// A type name was not found in the registry.
    #[error("unknown type name [{0}]")]
    UnknownType(String),

    /// An array element did not match the array's element type.
    #[error("array of <{expected}> cannot hold element of <{found}>")]
    BadElement {
        /// The array's element type name.
        expected: String,
        /// The offending element's type name.
        found: String,
    },
}
