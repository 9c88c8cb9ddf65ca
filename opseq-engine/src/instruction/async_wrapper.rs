//! Worker-thread wrapper for one instruction inside a parallel compound.

use super::{ExecContext, ExecutionStatus, Instruction};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Runs one wrapped instruction on a worker thread while the parent polls.
///
/// The wrapper borrows the wrapped instruction through `Arc`; halting goes
/// through the instruction's own halt flag. Dropping the wrapper joins the
/// worker, so parents clear their wrappers before resetting children.
pub struct AsyncWrapper {
    instruction: Arc<Instruction>,
    status: ExecutionStatus,
    worker: Option<JoinHandle<()>>,
}

impl AsyncWrapper {
    /// Wrap an instruction; nothing is launched yet.
    pub fn new(instruction: Arc<Instruction>) -> Self {
        AsyncWrapper {
            instruction,
            status: ExecutionStatus::NotStarted,
            worker: None,
        }
    }

    /// The wrapped instruction.
    pub fn instruction(&self) -> &Arc<Instruction> {
        &self.instruction
    }

    /// The wrapper's view of the execution status.
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// One polling step: while a worker is active this is a no-op; otherwise
    /// refresh the status from the instruction and launch a new worker when
    /// it still needs execution.
    pub fn tick(&mut self, ctx: &ExecContext) {
        if self.waiting_for_worker() {
            return;
        }
        let changed = self.update_status();
        if !changed && self.status.needs_execute() {
            self.launch(ctx);
            self.status = ExecutionStatus::Running;
        }
    }

    /// Refresh the wrapper status from the wrapped instruction. Returns true
    /// when it changed.
    pub fn update_status(&mut self) -> bool {
        let old = self.status;
        self.status = self.instruction.status();
        self.status != old
    }

    fn waiting_for_worker(&mut self) -> bool {
        match self.worker.take() {
            Some(handle) if handle.is_finished() => {
                let _ = handle.join();
                false
            }
            Some(handle) => {
                self.worker = Some(handle);
                true
            }
            None => false,
        }
    }

    fn launch(&mut self, ctx: &ExecContext) {
        let instruction = Arc::clone(&self.instruction);
        let ctx = ctx.clone();
        self.worker = Some(std::thread::spawn(move || {
            instruction.execute_single(&ctx);
        }));
    }
}

impl Drop for AsyncWrapper {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
