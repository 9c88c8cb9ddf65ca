//! Error types of the engine.
//!
//! Setup problems are the only failures that propagate as errors. Runtime
//! failures inside leaf instructions surface as `ExecutionStatus::Failure`
//! plus a warning through the observer, never as an error or panic.

use thiserror::Error;

/// A failure while configuring a procedure, instruction or variable.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    /// One or more attribute constraints failed validation.
    #[error("{context}failed attribute constraint(s): {}", .failed.join("; "))]
    AttributeValidation {
        /// Prolog naming the owner of the attributes.
        context: String,
        /// Human-readable representations of the failed constraints.
        failed: Vec<String>,
    },

    /// An instruction could not configure itself beyond attribute validation.
    #[error("{0}")]
    Instruction(String),

    /// Plugin load, type registration, workspace setup or root resolution
    /// failed at the procedure level.
    #[error("{0}")]
    Procedure(String),

    /// A variable could not configure itself from its attributes.
    #[error("{0}")]
    Variable(String),

    /// A collaborator failed to parse a referenced document.
    #[error("{0}")]
    Parse(String),
}

/// Programmatic misuse of an engine API, e.g. a breakpoint on an unknown
/// instruction or adding a duplicate variable name.
#[derive(Debug, Clone, Error)]
#[error("invalid operation: {0}")]
pub struct InvalidOperationError(pub String);

/// Why a user-input future did not yield a reply.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    /// The observer does not serve user input.
    #[error("user input is not supported by the observer")]
    Unsupported,

    /// The future is no longer valid.
    #[error("input future is no longer valid")]
    Invalid,

    /// The reply has not arrived; check `is_ready` first.
    #[error("input reply is not ready")]
    NotReady,

    /// The reply was already taken once.
    #[error("input reply was already consumed")]
    Consumed,
}
