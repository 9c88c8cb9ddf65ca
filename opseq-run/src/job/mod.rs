//! Asynchronous job control over a runner.

mod controller;
mod monitor;
mod queue;

pub use controller::JobController;
pub use monitor::{NullStateMonitor, SimpleStateMonitor, StateMonitor};
pub use queue::CommandQueue;

use std::fmt;

/// State of an asynchronously controlled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Procedure is set up and waiting for the first command.
    Initial,
    /// Ticks are being executed continuously.
    Running,
    /// A single tick is being executed.
    Stepping,
    /// Execution is suspended between ticks.
    Paused,
    /// The root finished with SUCCESS.
    Succeeded,
    /// The root finished with FAILURE.
    Failed,
    /// Execution was halted on request.
    Halted,
}

impl JobState {
    /// True for the states a finished job rests in.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Halted)
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Initial => "INITIAL",
            JobState::Running => "RUNNING",
            JobState::Stepping => "STEPPING",
            JobState::Paused => "PAUSED",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::Halted => "HALTED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands accepted by a [`JobController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCommand {
    /// Run until finished, paused or halted.
    Start,
    /// Execute a single tick, then pause.
    Step,
    /// Suspend between ticks.
    Pause,
    /// Return a finished job to its initial state.
    Reset,
    /// Cooperatively terminate execution; the job ends HALTED.
    Halt,
    /// Stop the control loop and release the background thread.
    Terminate,
}
