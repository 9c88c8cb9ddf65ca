//! Parallel compound execution over async wrappers.

use super::async_wrapper::AsyncWrapper;
use super::{ExecContext, ExecutionStatus, Instruction};
use crate::constants;
use crate::error::SetupError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

pub(crate) struct ParallelState {
    pub(crate) children: Vec<Arc<Instruction>>,
    success_threshold: AtomicU32,
    failure_threshold: AtomicU32,
    wrappers: Mutex<Vec<AsyncWrapper>>,
}

impl ParallelState {
    pub(crate) fn new(children: Vec<Arc<Instruction>>) -> Self {
        let count = children.len() as u32;
        ParallelState {
            children,
            success_threshold: AtomicU32::new(count),
            failure_threshold: AtomicU32::new(1),
            wrappers: Mutex::new(Vec::new()),
        }
    }

    /// Derive the success/failure thresholds from attributes.
    ///
    /// Both default to `(N, 1)`; a single supplied threshold derives the
    /// other so that the two cannot both stay unreachable.
    pub(crate) fn configure(&self, instr: &Instruction) -> Result<(), SetupError> {
        let count = self.children.len() as u32;
        let mut success_threshold = count;
        let mut failure_threshold = 1;
        let read = |name: &str| -> Result<u32, SetupError> {
            instr.with_attrs(|attrs| attrs.value_as::<u32>(name)).map_err(|e| {
                SetupError::Instruction(format!(
                    "{}could not parse attribute [{name}]: {e}",
                    instr.error_prolog()
                ))
            })
        };
        let success_from_attr = instr.has_attribute(constants::SUCCESS_THRESHOLD);
        if success_from_attr {
            success_threshold = count.min(read(constants::SUCCESS_THRESHOLD)?);
        }
        if instr.has_attribute(constants::FAILURE_THRESHOLD) {
            let threshold = count.min(read(constants::FAILURE_THRESHOLD)?);
            if success_from_attr {
                failure_threshold = threshold.min(count - success_threshold + 1);
            } else {
                failure_threshold = threshold;
                success_threshold = count - threshold + 1;
            }
        }
        self.success_threshold.store(success_threshold, Ordering::SeqCst);
        self.failure_threshold.store(failure_threshold, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn init_wrappers(&self) {
        let mut wrappers = self.wrappers.lock();
        wrappers.clear();
        for child in &self.children {
            wrappers.push(AsyncWrapper::new(Arc::clone(child)));
        }
    }

    pub(crate) fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        if self.children.is_empty() {
            return ExecutionStatus::Success;
        }
        let mut wrappers = self.wrappers.lock();
        for wrapper in wrappers.iter_mut() {
            if wrapper.status().needs_execute() {
                wrapper.tick(ctx);
            } else {
                wrapper.update_status();
            }
        }
        let status = self.combined_status(&wrappers);
        drop(wrappers);
        if status.is_finished() {
            // Coax still-running workers to exit.
            instr.halt();
        }
        status
    }

    pub(crate) fn reset(&self, instr: &Instruction) {
        // Halt anything that could still own a worker before joining.
        if !instr.status().is_finished() {
            instr.halt();
        }
        // Dropping the wrappers joins their workers.
        self.wrappers.lock().clear();
        for child in &self.children {
            child.reset();
        }
    }

    fn combined_status(&self, wrappers: &[AsyncWrapper]) -> ExecutionStatus {
        let mut successes = 0;
        let mut failures = 0;
        let mut not_finished = false;
        for wrapper in wrappers {
            match wrapper.status() {
                ExecutionStatus::Success => successes += 1,
                ExecutionStatus::Failure => failures += 1,
                ExecutionStatus::NotFinished | ExecutionStatus::NotStarted => not_finished = true,
                ExecutionStatus::Running => {}
            }
        }
        if successes >= self.success_threshold.load(Ordering::SeqCst) {
            return ExecutionStatus::Success;
        }
        if failures >= self.failure_threshold.load(Ordering::SeqCst) {
            return ExecutionStatus::Failure;
        }
        if not_finished {
            ExecutionStatus::NotFinished
        } else {
            ExecutionStatus::Running
        }
    }
}
