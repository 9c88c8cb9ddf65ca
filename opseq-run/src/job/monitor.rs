//! Job-state monitoring.

use super::JobState;
use opseq_engine::instruction::InstructionId;
use opseq_engine::procedure::Procedure;
use parking_lot::{Condvar, Mutex};

/// Receives job-level progress from a [`JobController`](super::JobController).
///
/// Callbacks arrive on the controller's background thread.
pub trait StateMonitor: Send + Sync {
    /// The job state changed.
    fn on_state_change(&self, _state: JobState) {}

    /// A breakpoint was set (`true`) or removed (`false`).
    fn on_breakpoint_change(&self, _instruction: InstructionId, _set: bool) {}

    /// A tick completed.
    fn on_tick(&self, _proc: &Procedure) {}
}

/// Monitor that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStateMonitor;

impl StateMonitor for NullStateMonitor {}

/// Monitor that records the current state and lets callers block until the
/// job finishes.
pub struct SimpleStateMonitor {
    state: Mutex<JobState>,
    history: Mutex<Vec<JobState>>,
    cv: Condvar,
}

impl SimpleStateMonitor {
    /// Create a monitor starting in [`JobState::Initial`].
    pub fn new() -> Self {
        SimpleStateMonitor {
            state: Mutex::new(JobState::Initial),
            history: Mutex::new(Vec::new()),
            cv: Condvar::new(),
        }
    }

    /// The last reported state.
    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    /// Every reported state, in order.
    pub fn history(&self) -> Vec<JobState> {
        self.history.lock().clone()
    }

    /// Block until the job reaches a finished state and return it.
    pub fn wait_until_finished(&self) -> JobState {
        let mut state = self.state.lock();
        loop {
            if state.is_finished() {
                return *state;
            }
            self.cv.wait(&mut state);
        }
    }

    /// Block until the job reaches the given state; false on timeout.
    pub fn wait_for_state(&self, wanted: JobState, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if *state == wanted {
                return true;
            }
            if self.cv.wait_until(&mut state, deadline).timed_out() {
                return *state == wanted;
            }
        }
    }
}

impl Default for SimpleStateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMonitor for SimpleStateMonitor {
    fn on_state_change(&self, state: JobState) {
        self.history.lock().push(state);
        *self.state.lock() = state;
        self.cv.notify_all();
    }
}
