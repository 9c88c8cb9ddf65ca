//! Synchronous tick driver over one procedure.

use crate::breakpoint::{Breakpoint, BreakpointManager};
use opseq_engine::error::{InvalidOperationError, SetupError};
use opseq_engine::instruction::InstructionId;
use opseq_engine::observer::Observer;
use opseq_engine::procedure::Procedure;
use opseq_engine::workspace::ListenerGuard;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback fired after every tick with the driven procedure.
pub type TickCallback = Box<dyn Fn(&Procedure) + Send + Sync>;

/// Drives a procedure one tick at a time, honoring breakpoints.
///
/// The runner is fully interior-mutable: `halt` and `pause` may be called
/// from other threads while `execute_procedure` runs.
pub struct Runner {
    ui: Arc<dyn Observer>,
    proc: Mutex<Option<Arc<Procedure>>>,
    breakpoints: Mutex<Arc<BreakpointManager>>,
    tick_cb: Mutex<Option<TickCallback>>,
    halt_loop: AtomicBool,
    hits: Mutex<Vec<InstructionId>>,
    ws_listener: Mutex<Option<ListenerGuard>>,
}

impl Runner {
    /// Create a runner reporting through the given observer.
    pub fn new(ui: Arc<dyn Observer>) -> Self {
        Runner {
            ui,
            proc: Mutex::new(None),
            breakpoints: Mutex::new(Arc::new(BreakpointManager::new())),
            tick_cb: Mutex::new(None),
            halt_loop: AtomicBool::new(false),
            hits: Mutex::new(Vec::new()),
            ws_listener: Mutex::new(None),
        }
    }

    /// Adopt a procedure: subscribe the observer to its workspace changes,
    /// set it up and build the breakpoint manager over its tree.
    pub fn set_procedure(&self, proc: Arc<Procedure>) -> Result<(), SetupError> {
        let ui = Arc::clone(&self.ui);
        let guard = proc
            .workspace()
            .register_generic_listener(Box::new(move |name, value, connected| {
                ui.variable_updated(name, value, connected);
            }));
        *self.ws_listener.lock() = Some(guard);
        proc.setup()?;
        *self.breakpoints.lock() = Arc::new(BreakpointManager::from_procedure(&proc));
        *self.proc.lock() = Some(proc);
        Ok(())
    }

    /// The driven procedure, if any.
    pub fn procedure(&self) -> Option<Arc<Procedure>> {
        self.proc.lock().clone()
    }

    /// Install or clear the per-tick callback.
    pub fn set_tick_callback(&self, cb: Option<TickCallback>) {
        *self.tick_cb.lock() = cb;
    }

    /// Arm a breakpoint; true when newly added.
    pub fn set_breakpoint(&self, id: InstructionId) -> Result<bool, InvalidOperationError> {
        self.breakpoints.lock().set(id)
    }

    /// Remove a breakpoint; true when one existed.
    pub fn remove_breakpoint(&self, id: InstructionId) -> bool {
        self.breakpoints.lock().remove(id)
    }

    /// Snapshot of the managed breakpoints.
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().list()
    }

    /// Run ticks until the procedure finishes, the loop is paused or halted,
    /// or an armed breakpoint pre-empts the next tick.
    pub fn execute_procedure(&self) {
        self.halt_loop.store(false, Ordering::SeqCst);
        self.hits.lock().clear();
        let Some(proc) = self.procedure() else {
            return;
        };
        while !self.is_finished() && !self.halt_loop.load(Ordering::SeqCst) {
            let next = proc.next_leaves();
            if !next.is_empty() {
                let hit = self.breakpoints.lock().handle(&next);
                if !hit.is_empty() {
                    *self.hits.lock() = hit;
                    return;
                }
            }
            self.execute_single();
        }
    }

    /// One tick: execute, re-arm released breakpoints, fire the callback.
    pub fn execute_single(&self) {
        let Some(proc) = self.procedure() else {
            return;
        };
        proc.execute_single(&self.ui);
        self.breakpoints.lock().reset_released();
        let cb = self.tick_cb.lock();
        if let Some(cb) = cb.as_ref() {
            cb(&proc);
        }
    }

    /// Breakpoints that pre-empted the last `execute_procedure` call.
    pub fn breakpoint_hits(&self) -> Vec<InstructionId> {
        self.hits.lock().clone()
    }

    /// Stop the loop and cooperatively halt the procedure tree.
    pub fn halt(&self) {
        self.halt_loop.store(true, Ordering::SeqCst);
        if let Some(proc) = self.procedure() {
            proc.halt();
        }
    }

    /// Stop the loop at the next tick boundary without disturbing the tree.
    pub fn pause(&self) {
        self.halt_loop.store(true, Ordering::SeqCst);
    }

    /// True when the root is terminal, halt-requested, or there is nothing
    /// to run.
    pub fn is_finished(&self) -> bool {
        let Some(proc) = self.procedure() else {
            return true;
        };
        if proc.status().is_finished() {
            return true;
        }
        match proc.root_instruction() {
            Some(root) => root.is_halt_requested(),
            None => true,
        }
    }

    /// True while the root reports a worker-owned RUNNING status.
    pub fn is_running(&self) -> bool {
        self.procedure()
            .map(|proc| proc.status() == opseq_engine::instruction::ExecutionStatus::Running)
            .unwrap_or(false)
    }
}
