//! Breakpoints keyed on instruction identity.

use opseq_engine::error::InvalidOperationError;
use opseq_engine::instruction::InstructionId;
use opseq_engine::procedure::Procedure;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Lifecycle of one breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointStatus {
    /// Armed; pre-empts the tick when its instruction comes up next.
    Set,
    /// Temporarily released so the next tick can move past it.
    Released,
}

/// A breakpoint on one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    /// Identity of the instruction the breakpoint guards.
    pub instruction: InstructionId,
    /// Current lifecycle state.
    pub status: BreakpointStatus,
}

/// Manages the breakpoints of one procedure tree.
///
/// Only instructions present in the tree at construction time are valid
/// breakpoint targets.
pub struct BreakpointManager {
    known: HashSet<InstructionId>,
    breakpoints: Mutex<Vec<Breakpoint>>,
}

impl BreakpointManager {
    /// Manager that knows no instructions; every set fails.
    pub fn new() -> Self {
        BreakpointManager {
            known: HashSet::new(),
            breakpoints: Mutex::new(Vec::new()),
        }
    }

    /// Manager over every instruction reachable from the procedure's root.
    pub fn from_procedure(proc: &Procedure) -> Self {
        BreakpointManager {
            known: proc
                .flatten_instructions()
                .iter()
                .map(|instr| instr.id())
                .collect(),
            breakpoints: Mutex::new(Vec::new()),
        }
    }

    /// Arm a breakpoint. Returns true when it was newly added, false when it
    /// already existed; unknown instructions are an error.
    pub fn set(&self, instruction: InstructionId) -> Result<bool, InvalidOperationError> {
        if !self.known.contains(&instruction) {
            return Err(InvalidOperationError(
                "trying to set a breakpoint at non-existent instruction".to_string(),
            ));
        }
        let mut breakpoints = self.breakpoints.lock();
        if breakpoints.iter().any(|bp| bp.instruction == instruction) {
            return Ok(false);
        }
        breakpoints.push(Breakpoint {
            instruction,
            status: BreakpointStatus::Set,
        });
        Ok(true)
    }

    /// Remove a breakpoint. Returns true when one existed.
    pub fn remove(&self, instruction: InstructionId) -> bool {
        let mut breakpoints = self.breakpoints.lock();
        let before = breakpoints.len();
        breakpoints.retain(|bp| bp.instruction != instruction);
        breakpoints.len() != before
    }

    /// Release and report every armed breakpoint among the instructions the
    /// next tick will touch. Released breakpoints do not re-trigger until
    /// [`BreakpointManager::reset_released`] re-arms them.
    pub fn handle(&self, next_instructions: &[InstructionId]) -> Vec<InstructionId> {
        let mut hit = Vec::new();
        let mut breakpoints = self.breakpoints.lock();
        for bp in breakpoints.iter_mut() {
            if !next_instructions.contains(&bp.instruction) {
                continue;
            }
            if bp.status == BreakpointStatus::Set {
                bp.status = BreakpointStatus::Released;
                hit.push(bp.instruction);
            }
        }
        hit
    }

    /// Re-arm every released breakpoint. Idempotent; called after each tick.
    pub fn reset_released(&self) {
        let mut breakpoints = self.breakpoints.lock();
        for bp in breakpoints.iter_mut() {
            if bp.status == BreakpointStatus::Released {
                bp.status = BreakpointStatus::Set;
            }
        }
    }

    /// Snapshot of the managed breakpoints.
    pub fn list(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().clone()
    }
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opseq_engine::catalogue::{sequence, wait};

    fn procedure_with_two_waits() -> (Procedure, InstructionId, InstructionId) {
        let a = wait();
        let b = wait();
        let (a_id, b_id) = (a.id(), b.id());
        let proc = Procedure::new();
        proc.push_instruction(sequence(vec![a, b]));
        (proc, a_id, b_id)
    }

    #[test]
    fn unknown_instruction_is_rejected() {
        let (proc, _, _) = procedure_with_two_waits();
        let mgr = BreakpointManager::from_procedure(&proc);
        let stranger = wait();
        assert!(mgr.set(stranger.id()).is_err());
    }

    #[test]
    fn set_is_idempotent_per_instruction() {
        let (proc, a, _) = procedure_with_two_waits();
        let mgr = BreakpointManager::from_procedure(&proc);
        assert!(mgr.set(a).unwrap());
        assert!(!mgr.set(a).unwrap());
        assert_eq!(mgr.list().len(), 1);
        assert!(mgr.remove(a));
        assert!(!mgr.remove(a));
    }

    #[test]
    fn handle_releases_and_reset_rearms() {
        let (proc, a, b) = procedure_with_two_waits();
        let mgr = BreakpointManager::from_procedure(&proc);
        mgr.set(b).unwrap();

        // The armed breakpoint only fires for its own instruction.
        assert!(mgr.handle(&[a]).is_empty());
        assert_eq!(mgr.handle(&[b]), vec![b]);
        // Released: a second handle passes so execution can move past it.
        assert!(mgr.handle(&[b]).is_empty());

        mgr.reset_released();
        assert_eq!(mgr.handle(&[b]), vec![b]);
        // Idempotent re-arm.
        mgr.reset_released();
        mgr.reset_released();
        assert_eq!(mgr.list()[0].status, BreakpointStatus::Set);
    }
}
