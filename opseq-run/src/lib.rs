#![deny(missing_docs)]
//! Drivers for opseq procedures.
//!
//! The [`Runner`] advances a procedure one tick at a time on the calling
//! thread, pre-empting ticks on armed breakpoints. The [`JobController`]
//! wraps a runner in a background control loop fed by a priority command
//! queue (start/step/pause/reset/halt/terminate). The [`AsyncInputAdapter`]
//! turns a blocking user-input backend into the cancellable futures the
//! engine's user-input instructions poll.

pub mod breakpoint;
pub mod input;
pub mod job;
pub mod runner;

pub use breakpoint::{Breakpoint, BreakpointManager, BreakpointStatus};
pub use input::{AdapterFuture, AsyncInputAdapter, InputFn, InterruptFn};
pub use job::{
    CommandQueue, JobCommand, JobController, JobState, NullStateMonitor, SimpleStateMonitor,
    StateMonitor,
};
pub use runner::{Runner, TickCallback};
