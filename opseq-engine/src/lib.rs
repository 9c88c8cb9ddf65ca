#![deny(missing_docs)]
//! Instruction tree, workspace and procedure model of the opseq engine.
//!
//! An operational procedure is a static tree of instructions (sequences,
//! fallbacks, parallels, decorators and leaf actions) executed one
//! cooperative tick at a time over a shared, typed [`Workspace`]. The
//! embedding application observes progress and serves user input through the
//! [`Observer`] capability set; drivers such as runners and job controllers
//! live in `opseq-run`.
//!
//! Setup-time problems propagate as [`SetupError`]s. Runtime failures inside
//! leaf instructions never do: they surface as
//! [`ExecutionStatus::Failure`] plus a warning log.

pub mod attr;
pub mod catalogue;
pub mod constants;
pub mod error;
pub mod instruction;
pub mod observer;
pub mod procedure;
pub mod variable;
pub mod variables;
pub mod workspace;

pub use attr::{
    AttributeCategory, AttributeDefinition, AttributeHandler, AttributeValueInfo, Constraint,
};
pub use catalogue::InstructionRegistry;
pub use error::{InputError, InvalidOperationError, SetupError};
pub use instruction::{
    Action, ExecContext, ExecutionStatus, Instruction, InstructionCategory, InstructionId,
    flatten_tree,
};
pub use observer::{
    DialogType, InputFuture, NullObserver, Observer, Severity, UserInputReply, UserInputRequest,
};
pub use procedure::{Preamble, Procedure, ProcedureLoader, ProcedureStore, TypeRegistration};
pub use variable::{SharedSetup, Variable, VariableKind, VariableSetupContext};
pub use variables::VariableRegistry;
pub use workspace::{ListenerGuard, Workspace};
