//! The asynchronous job controller.

use super::monitor::StateMonitor;
use super::queue::CommandQueue;
use super::{JobCommand, JobState};
use crate::breakpoint::Breakpoint;
use crate::runner::{Runner, TickCallback};
use opseq_engine::error::SetupError;
use opseq_engine::instruction::{ExecutionStatus, InstructionId};
use opseq_engine::observer::{Observer, Severity};
use opseq_engine::procedure::Procedure;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Asynchronous controller over one procedure.
///
/// Construction sets the procedure up and launches the background control
/// loop; the public methods enqueue commands and return immediately. `halt`
/// and `terminate` jump the command queue and synchronously halt the runner
/// so a blocked tick thread unblocks. Observer and monitor callbacks arrive
/// on the background thread.
pub struct JobController {
    shared: Arc<ControllerShared>,
    thread: Option<JoinHandle<()>>,
}

struct ControllerShared {
    proc: Arc<Procedure>,
    runner: Arc<Runner>,
    ui: Arc<dyn Observer>,
    monitor: Arc<dyn StateMonitor>,
    queue: CommandQueue,
    keep_alive: AtomicBool,
    state: Mutex<JobState>,
}

enum LoopAction {
    Continue,
    Run,
    Step,
    Exit,
}

impl JobController {
    /// Set the procedure up and launch the control loop.
    pub fn new(
        proc: Arc<Procedure>,
        ui: Arc<dyn Observer>,
        monitor: Arc<dyn StateMonitor>,
    ) -> Result<Self, SetupError> {
        let runner = Arc::new(Runner::new(Arc::clone(&ui)));
        runner.set_procedure(Arc::clone(&proc))?;
        let shared = Arc::new(ControllerShared {
            proc,
            runner,
            ui,
            monitor,
            queue: CommandQueue::new(),
            keep_alive: AtomicBool::new(true),
            state: Mutex::new(JobState::Initial),
        });
        shared.monitor.on_state_change(JobState::Initial);
        let loop_shared = Arc::clone(&shared);
        let thread = std::thread::spawn(move || execution_loop(&loop_shared));
        Ok(JobController {
            shared,
            thread: Some(thread),
        })
    }

    /// Run until finished, paused or halted.
    pub fn start(&self) {
        self.shared.queue.push(JobCommand::Start);
    }

    /// Execute one tick, then pause.
    pub fn step(&self) {
        self.shared.queue.push(JobCommand::Step);
    }

    /// Suspend between ticks.
    pub fn pause(&self) {
        self.shared.queue.push(JobCommand::Pause);
    }

    /// Return a finished job to its initial state.
    pub fn reset(&self) {
        self.shared.queue.push(JobCommand::Reset);
    }

    /// Cooperatively terminate the job; it ends HALTED.
    ///
    /// Jumps the command queue and synchronously unblocks the tick thread.
    pub fn halt(&self) {
        self.shared.queue.push_priority(JobCommand::Halt);
        self.shared.runner.halt();
    }

    /// Stop the control loop and join the background thread.
    pub fn terminate(&mut self) {
        self.shared.queue.push_priority(JobCommand::Terminate);
        self.shared.runner.halt();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// Arm a breakpoint; invalid instructions are silently ignored.
    pub fn set_breakpoint(&self, instruction: InstructionId) {
        if let Ok(true) = self.shared.runner.set_breakpoint(instruction) {
            self.shared.monitor.on_breakpoint_change(instruction, true);
        }
    }

    /// Remove a breakpoint.
    pub fn remove_breakpoint(&self, instruction: InstructionId) {
        if self.shared.runner.remove_breakpoint(instruction) {
            self.shared.monitor.on_breakpoint_change(instruction, false);
        }
    }

    /// Snapshot of the managed breakpoints.
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.shared.runner.breakpoints()
    }

    /// The controlled procedure.
    pub fn procedure(&self) -> Arc<Procedure> {
        Arc::clone(&self.shared.proc)
    }

    /// The current job state.
    pub fn state(&self) -> JobState {
        *self.shared.state.lock()
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn execution_loop(me: &Arc<ControllerShared>) {
    while me.keep_alive.load(Ordering::SeqCst) {
        let command = me.queue.wait_pop();
        match me.handle_command(command) {
            LoopAction::Continue => continue,
            LoopAction::Run => run_procedure(me),
            LoopAction::Step => step_procedure(me),
            LoopAction::Exit => return,
        }
    }
}

fn run_procedure(me: &Arc<ControllerShared>) {
    let timeout = me.proc.tick_timeout();
    let cb_shared = Arc::clone(me);
    let callback: TickCallback = Box::new(move |proc| {
        cb_shared.process_commands_when_running();
        if proc.status() == ExecutionStatus::Running {
            std::thread::sleep(timeout);
        }
        cb_shared.monitor.on_tick(proc);
    });
    me.runner.set_tick_callback(Some(callback));
    me.runner.execute_procedure();
    // A breakpoint hit suspends the job before other queued commands run.
    if !me.runner.breakpoint_hits().is_empty() {
        me.set_state(JobState::Paused);
    } else {
        me.switch_state_on_finished();
    }
}

fn step_procedure(me: &Arc<ControllerShared>) {
    let cb_shared = Arc::clone(me);
    me.runner
        .set_tick_callback(Some(Box::new(move |proc| cb_shared.monitor.on_tick(proc))));
    me.runner.execute_single();
    if !me.switch_state_on_finished() {
        me.set_state(JobState::Paused);
    }
}

impl ControllerShared {
    fn set_state(&self, state: JobState) {
        *self.state.lock() = state;
        self.monitor.on_state_change(state);
    }

    fn handle_command(&self, command: JobCommand) -> LoopAction {
        let state = *self.state.lock();
        if command == JobCommand::Terminate {
            self.keep_alive.store(false, Ordering::SeqCst);
            return LoopAction::Exit;
        }
        match (state, command) {
            (JobState::Initial | JobState::Paused, JobCommand::Start) => {
                self.set_state(JobState::Running);
                LoopAction::Run
            }
            (JobState::Initial | JobState::Paused, JobCommand::Step) => {
                self.set_state(JobState::Stepping);
                LoopAction::Step
            }
            (JobState::Initial | JobState::Paused, JobCommand::Halt) => {
                self.set_state(JobState::Halted);
                LoopAction::Continue
            }
            (JobState::Running, JobCommand::Step | JobCommand::Pause) => {
                self.runner.pause();
                self.set_state(JobState::Paused);
                LoopAction::Continue
            }
            (JobState::Running, JobCommand::Halt) => {
                self.set_state(JobState::Halted);
                LoopAction::Continue
            }
            (JobState::Succeeded | JobState::Failed | JobState::Halted, JobCommand::Reset) => {
                match self.proc.reset() {
                    Ok(()) => self.set_state(JobState::Initial),
                    Err(e) => self
                        .ui
                        .log(Severity::Error, &format!("procedure reset failed: {e}")),
                }
                LoopAction::Continue
            }
            _ => LoopAction::Continue,
        }
    }

    /// In-tick command processing: one pending command, then the finished
    /// check. A halt that already moved the job to HALTED is never
    /// downgraded by a root that failed while being halted.
    fn process_commands_when_running(&self) {
        if let Some(command) = self.queue.try_pop() {
            let _ = self.handle_command(command);
        }
        self.switch_state_on_finished();
    }

    fn switch_state_on_finished(&self) -> bool {
        if self.state.lock().is_finished() {
            return true;
        }
        let status = self.proc.status();
        if !status.is_finished() {
            return false;
        }
        if status == ExecutionStatus::Success {
            self.set_state(JobState::Succeeded);
        } else {
            self.set_state(JobState::Failed);
        }
        true
    }
}
