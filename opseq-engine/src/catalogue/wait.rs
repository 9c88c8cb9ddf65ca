//! The `Wait` leaf.

use crate::attr::AttributeCategory;
use crate::constants;
use crate::instruction::{Action, ExecContext, ExecutionStatus, Instruction};
use crate::observer::log_warning;
use opseq_value::ValueType;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Succeeds once `timeout` seconds (default 0) have passed since its first
/// tick. Waiting is cooperative: every tick checks the deadline and returns.
pub fn wait() -> Instruction {
    let instr = Instruction::leaf("Wait", Box::new(WaitAction::default()));
    instr.with_attrs(|attrs| {
        attrs
            .define(constants::TIMEOUT, ValueType::Float64)
            .category_mut(AttributeCategory::Both);
    });
    instr
}

#[derive(Default)]
struct WaitAction {
    deadline: Mutex<Option<Instant>>,
}

impl Action for WaitAction {
    fn init(&self) {
        *self.deadline.lock() = None;
    }

    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        if instr.is_halt_requested() {
            return ExecutionStatus::Failure;
        }
        let deadline = {
            let mut guard = self.deadline.lock();
            match *guard {
                Some(deadline) => deadline,
                None => {
                    let seconds =
                        match instr.attribute_value_or::<f64>(constants::TIMEOUT, ctx, 0.0) {
                            Ok(seconds) => seconds,
                            Err(message) => {
                                log_warning(ctx.ui.as_ref(), &message);
                                return ExecutionStatus::Failure;
                            }
                        };
                    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
                    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
                    *guard = Some(deadline);
                    deadline
                }
            }
        };
        if Instant::now() >= deadline {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::NotFinished
        }
    }

    fn reset(&self) {
        *self.deadline.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use crate::workspace::Workspace;
    use std::sync::Arc;

    fn ctx() -> ExecContext {
        ExecContext::new(Arc::new(NullObserver), Workspace::new())
    }

    #[test]
    fn zero_timeout_succeeds_on_first_tick() {
        let instr = wait();
        instr.add_attribute(constants::TIMEOUT, "0");
        instr.execute_single(&ctx());
        assert_eq!(instr.status(), ExecutionStatus::Success);
    }

    #[test]
    fn waits_until_the_deadline() {
        let instr = wait();
        instr.add_attribute(constants::TIMEOUT, "0.05");
        let ctx = ctx();
        instr.execute_single(&ctx);
        assert_eq!(instr.status(), ExecutionStatus::NotFinished);
        std::thread::sleep(Duration::from_millis(80));
        instr.execute_single(&ctx);
        assert_eq!(instr.status(), ExecutionStatus::Success);
    }

    #[test]
    fn reset_restarts_the_clock() {
        let instr = wait();
        instr.add_attribute(constants::TIMEOUT, "0");
        let ctx = ctx();
        instr.execute_single(&ctx);
        assert_eq!(instr.status(), ExecutionStatus::Success);
        instr.reset();
        assert_eq!(instr.status(), ExecutionStatus::NotStarted);
        instr.execute_single(&ctx);
        assert_eq!(instr.status(), ExecutionStatus::Success);
    }

    #[test]
    fn halted_wait_fails() {
        let instr = wait();
        instr.add_attribute(constants::TIMEOUT, "10");
        let ctx = ctx();
        instr.execute_single(&ctx);
        assert_eq!(instr.status(), ExecutionStatus::NotFinished);
        instr.halt();
        instr.execute_single(&ctx);
        assert_eq!(instr.status(), ExecutionStatus::Failure);
    }
}
