//! End-to-end job control scenarios.

use opseq_engine::catalogue::{equals, inverter, parallel_sequence, sequence, wait};
use opseq_engine::constants;
use opseq_engine::instruction::{ExecutionStatus, Instruction};
use opseq_engine::observer::{InputFuture, Observer, UserInputReply, UserInputRequest};
use opseq_engine::procedure::Procedure;
use opseq_engine::variables::local_variable;
use opseq_run::input::AsyncInputAdapter;
use opseq_run::job::{JobController, JobState, SimpleStateMonitor, StateMonitor};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Test doubles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct RecordingObserver {
    transitions: Mutex<Vec<(String, ExecutionStatus)>>,
}

impl Observer for RecordingObserver {
    fn update_instruction_status(&self, instruction: &Instruction) {
        self.transitions
            .lock()
            .unwrap()
            .push((instruction.name(), instruction.status()));
    }
}

impl RecordingObserver {
    fn of(&self, name: &str) -> Vec<ExecutionStatus> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .collect()
    }
}

fn named_wait(name: &str, timeout: &str) -> Instruction {
    let instr = wait();
    instr.set_name(name);
    instr.add_attribute(constants::TIMEOUT, timeout);
    instr
}

fn fast_procedure(root: Instruction) -> Arc<Procedure> {
    let proc = Procedure::new();
    proc.add_attribute(constants::TICK_TIMEOUT, "0.005");
    proc.push_instruction(root);
    Arc::new(proc)
}

fn controller(
    proc: Arc<Procedure>,
    ui: Arc<dyn Observer>,
) -> (JobController, Arc<SimpleStateMonitor>) {
    let monitor = Arc::new(SimpleStateMonitor::new());
    let ctrl = JobController::new(proc, ui, monitor.clone() as Arc<dyn StateMonitor>).unwrap();
    (ctrl, monitor)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Immediate success / failure propagation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn zero_wait_sequence_succeeds_immediately() {
    let ui = Arc::new(RecordingObserver::default());
    let root = sequence(vec![named_wait("wait", "0")]);
    root.set_name("root");
    let (ctrl, monitor) = controller(fast_procedure(root), ui.clone());

    ctrl.start();
    assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);
    assert_eq!(
        ui.of("wait"),
        vec![ExecutionStatus::NotFinished, ExecutionStatus::Success]
    );
    let root_transitions = ui.of("root");
    assert_eq!(root_transitions.first(), Some(&ExecutionStatus::NotFinished));
    assert_eq!(root_transitions.last(), Some(&ExecutionStatus::Success));
}

#[test]
fn failing_comparison_fails_the_job_and_skips_the_rest() {
    let ws_proc = Procedure::new();
    ws_proc.add_attribute(constants::TICK_TIMEOUT, "0.005");
    for (name, value) in [("a", "1"), ("b", "2")] {
        let var = local_variable();
        var.add_attribute(constants::NAME, name);
        var.add_attribute(constants::TYPE, "uint32");
        var.add_attribute(constants::VALUE, value);
        ws_proc.add_variable(name, var).unwrap();
    }
    let check = equals();
    check.set_name("check");
    check.add_attribute(constants::LEFT_VAR, "a");
    check.add_attribute(constants::RIGHT_VAR, "b");
    let tail = named_wait("tail", "0");
    let tail_id = tail.id();
    ws_proc.push_instruction(sequence(vec![check, tail]));
    let proc = Arc::new(ws_proc);

    let ui = Arc::new(RecordingObserver::default());
    let (ctrl, monitor) = controller(proc.clone(), ui.clone());
    ctrl.start();
    assert_eq!(monitor.wait_until_finished(), JobState::Failed);
    assert_eq!(ui.of("check").last(), Some(&ExecutionStatus::Failure));
    // The instruction after the failure was never started.
    assert_eq!(
        proc.find_instruction(tail_id).unwrap().status(),
        ExecutionStatus::NotStarted
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parallel thresholds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn parallel_success_threshold_finishes_the_job() {
    let slow_failure = inverter(named_wait("slow", "10"));
    let root = parallel_sequence(vec![
        named_wait("quick", "0.02"),
        named_wait("quicker", "0.05"),
        slow_failure,
    ]);
    root.add_attribute(constants::SUCCESS_THRESHOLD, "2");
    root.add_attribute(constants::FAILURE_THRESHOLD, "3");
    let proc = fast_procedure(root);

    let ui = Arc::new(RecordingObserver::default());
    let (ctrl, monitor) = controller(proc.clone(), ui);
    ctrl.start();
    assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);
    // The third child never completed on its own terms.
    let root = proc.root_instruction().unwrap();
    assert!(root.children()[2].is_halt_requested());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Breakpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn breakpoint_pauses_and_resumes() {
    let a = named_wait("a", "0");
    let b = named_wait("b", "0");
    let c = named_wait("c", "0");
    let (a_id, b_id) = (a.id(), b.id());
    let proc = fast_procedure(sequence(vec![a, b, c]));

    let ui = Arc::new(RecordingObserver::default());
    let (ctrl, monitor) = controller(proc.clone(), ui);
    ctrl.set_breakpoint(b_id);
    ctrl.start();
    assert!(monitor.wait_for_state(JobState::Paused, Duration::from_secs(5)));
    assert_eq!(
        proc.find_instruction(a_id).unwrap().status(),
        ExecutionStatus::Success
    );
    assert_eq!(
        proc.find_instruction(b_id).unwrap().status(),
        ExecutionStatus::NotStarted
    );

    ctrl.start();
    assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);

    // Re-running with the same breakpoint pauses again.
    ctrl.reset();
    assert!(monitor.wait_for_state(JobState::Initial, Duration::from_secs(5)));
    ctrl.start();
    assert!(monitor.wait_for_state(JobState::Paused, Duration::from_secs(5)));
    assert_eq!(
        proc.find_instruction(b_id).unwrap().status(),
        ExecutionStatus::NotStarted
    );
    ctrl.start();
    assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);
}

#[test]
fn stepping_pauses_between_ticks() {
    let proc = fast_procedure(sequence(vec![
        named_wait("a", "0"),
        named_wait("b", "0"),
    ]));
    let ui = Arc::new(RecordingObserver::default());
    let (ctrl, monitor) = controller(proc.clone(), ui);

    ctrl.step();
    assert!(monitor.wait_for_state(JobState::Paused, Duration::from_secs(5)));
    assert_eq!(proc.status(), ExecutionStatus::NotFinished);

    ctrl.step();
    assert!(monitor.wait_for_state(JobState::Succeeded, Duration::from_secs(5)));
    assert!(monitor.history().contains(&JobState::Stepping));
}

#[test]
fn pause_then_start_continues_to_the_end() {
    let proc = fast_procedure(sequence(vec![
        named_wait("a", "0.1"),
        named_wait("b", "0.1"),
    ]));
    let ui = Arc::new(RecordingObserver::default());
    let (ctrl, monitor) = controller(proc, ui);

    ctrl.start();
    std::thread::sleep(Duration::from_millis(30));
    ctrl.pause();
    assert!(monitor.wait_for_state(JobState::Paused, Duration::from_secs(5)));

    ctrl.start();
    assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User input and halting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct ChoiceBackendState {
    replies: HashMap<u64, UserInputReply>,
    interrupted: HashSet<u64>,
    seen: Vec<u64>,
}

/// Blocking user-choice backend scripted by the test.
struct ChoiceBackend {
    state: Mutex<ChoiceBackendState>,
    cv: Condvar,
}

impl ChoiceBackend {
    fn new() -> Arc<Self> {
        Arc::new(ChoiceBackend {
            state: Mutex::new(ChoiceBackendState::default()),
            cv: Condvar::new(),
        })
    }

    fn provide(&self, id: u64, reply: UserInputReply) {
        self.state.lock().unwrap().replies.insert(id, reply);
        self.cv.notify_all();
    }

    fn interrupt(&self, id: u64) {
        self.state.lock().unwrap().interrupted.insert(id);
        self.cv.notify_all();
    }

    fn blocking_reply(&self, id: u64) -> UserInputReply {
        let mut state = self.state.lock().unwrap();
        state.seen.push(id);
        loop {
            if state.interrupted.remove(&id) {
                return UserInputReply::Choice {
                    accepted: false,
                    index: 0,
                };
            }
            if let Some(reply) = state.replies.remove(&id) {
                return reply;
            }
            state = self.cv.wait(state).unwrap();
        }
    }

    fn first_seen_id(&self, timeout: Duration) -> Option<u64> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(id) = self.state.lock().unwrap().seen.first().copied() {
                return Some(id);
            }
            if std::time::Instant::now() > deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Observer that serves user input through an [`AsyncInputAdapter`].
struct InputObserver {
    adapter: AsyncInputAdapter,
}

impl InputObserver {
    fn new(backend: Arc<ChoiceBackend>) -> Self {
        let input_backend = Arc::clone(&backend);
        let interrupt_backend = backend;
        InputObserver {
            adapter: AsyncInputAdapter::new(
                Box::new(move |_request, id| input_backend.blocking_reply(id)),
                Box::new(move |id| interrupt_backend.interrupt(id)),
            ),
        }
    }
}

impl Observer for InputObserver {
    fn request_user_input(&self, request: UserInputRequest) -> Option<Box<dyn InputFuture>> {
        Some(Box::new(self.adapter.submit(request)))
    }
}

fn confirmation_procedure() -> Arc<Procedure> {
    let confirm = opseq_engine::catalogue::user_confirmation();
    confirm.set_name("confirm");
    confirm.add_attribute(constants::DESCRIPTION, "Continue?");
    fast_procedure(sequence(vec![confirm]))
}

#[test]
fn confirmed_choice_succeeds() {
    let backend = ChoiceBackend::new();
    let ui = Arc::new(InputObserver::new(Arc::clone(&backend)));
    let (ctrl, monitor) = controller(confirmation_procedure(), ui);
    ctrl.start();

    let id = backend.first_seen_id(Duration::from_secs(5)).unwrap();
    backend.provide(
        id,
        UserInputReply::Choice {
            accepted: true,
            index: 0,
        },
    );
    assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);
}

#[test]
fn halt_cancels_the_pending_request_and_halts_the_job() {
    let backend = ChoiceBackend::new();
    let ui = Arc::new(InputObserver::new(Arc::clone(&backend)));
    let proc = confirmation_procedure();
    let (ctrl, monitor) = controller(proc.clone(), ui);
    ctrl.start();

    // The request reached the backend; nobody answers it.
    let id = backend.first_seen_id(Duration::from_secs(5)).unwrap();
    ctrl.halt();
    assert_eq!(monitor.wait_until_finished(), JobState::Halted);
    // Cancellation interrupted the in-flight request; the backend consumes
    // the interrupt marker when it unblocks.
    assert!(backend.state.lock().unwrap().replies.is_empty());
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while backend.state.lock().unwrap().interrupted.contains(&id) {
        assert!(std::time::Instant::now() < deadline, "interrupt never consumed");
        std::thread::sleep(Duration::from_millis(5));
    }
    let root = proc.root_instruction().unwrap();
    assert_eq!(root.children()[0].status(), ExecutionStatus::Failure);
}

#[test]
fn dropping_the_controller_terminates_cleanly() {
    let proc = fast_procedure(sequence(vec![named_wait("a", "5")]));
    let ui = Arc::new(RecordingObserver::default());
    let (ctrl, _monitor) = controller(proc, ui);
    ctrl.start();
    std::thread::sleep(Duration::from_millis(30));
    drop(ctrl);
}
