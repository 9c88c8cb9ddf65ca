#![deny(missing_docs)]
//! Behavior-tree sequencing engine for operational procedures.
//!
//! This crate re-exports the opseq stack behind feature flags:
//!
//! - `engine` (default): the instruction tree, workspace and procedure model
//!   from `opseq-engine`.
//! - `run` (default): the runner, breakpoint manager, job controller and
//!   async input adapter from `opseq-run`.
//! - `parse`: JSON procedure documents from `opseq-parse`.
//!
//! The typed value model is always available as [`value`].

/// Typed value model: scalars, arrays, structures, paths and JSON.
pub mod value {
    pub use opseq_value::*;
}

#[cfg(feature = "engine")]
/// Instruction tree, workspace and procedure model.
pub mod engine {
    pub use opseq_engine::*;
}

#[cfg(feature = "run")]
/// Runner, breakpoints, job control and user-input adaptation.
pub mod run {
    pub use opseq_run::*;
}

#[cfg(feature = "parse")]
/// JSON procedure documents.
pub mod parse {
    pub use opseq_parse::*;
}

pub use opseq_value::{Value, ValueType};

#[cfg(feature = "engine")]
pub use opseq_engine::{
    ExecutionStatus, Instruction, Observer, Procedure, Severity, Workspace,
};

#[cfg(feature = "run")]
pub use opseq_run::{JobController, JobState, Runner, SimpleStateMonitor, StateMonitor};

#[cfg(feature = "parse")]
pub use opseq_parse::ProcedureParser;
