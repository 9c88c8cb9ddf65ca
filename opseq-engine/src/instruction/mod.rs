//! The instruction tree and its per-tick interpreter.
//!
//! An [`Instruction`] is one node of a procedure's behavior tree: a leaf
//! [`Action`], a decorator over one child, or a compound over many. Shared
//! state (type tag, attributes, execution status, halt flag) lives in the
//! node itself; per-variant state lives in the behavior. Parents own their
//! children; worker threads spawned by parallel compounds share children
//! through `Arc` and are joined before reset.
//!
//! Status is read and written under a small internal lock so observer
//! threads see consistent values; the lock is never held while calling the
//! observer.

pub mod async_wrapper;
pub(crate) mod parallel;

use crate::attr::AttributeHandler;
use crate::constants;
use crate::error::SetupError;
use crate::observer::Observer;
use crate::procedure::{IncludeState, Procedure};
use crate::workspace::Workspace;
use opseq_value::{FromValue, Value};
use parallel::ParallelState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Execution status of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Never ticked since construction or the last reset.
    NotStarted,
    /// Needs more ticks; safe to inspect between ticks.
    NotFinished,
    /// A worker thread currently owns progress.
    Running,
    /// Finished successfully.
    Success,
    /// Finished unsuccessfully.
    Failure,
}

impl ExecutionStatus {
    /// Terminal states.
    pub fn is_finished(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failure)
    }

    /// States in which a tick makes progress (running instructions are
    /// already making their own).
    pub fn needs_execute(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::NotStarted | ExecutionStatus::NotFinished
        )
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::NotStarted => "NOT_STARTED",
            ExecutionStatus::NotFinished => "NOT_FINISHED",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide unique identity of an instruction, used for breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionId(u64);

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_INSTRUCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Structural category of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionCategory {
    /// Leaf with no children.
    Action,
    /// Exactly one child.
    Decorator,
    /// Any number of children.
    Compound,
}

/// Everything a tick needs: the observer and the workspace.
#[derive(Clone)]
pub struct ExecContext {
    /// Capability set for status updates, user I/O and logging.
    pub ui: Arc<dyn Observer>,
    /// The procedure's variable scope.
    pub ws: Workspace,
}

impl ExecContext {
    /// Bundle an observer and workspace.
    pub fn new(ui: Arc<dyn Observer>, ws: Workspace) -> Self {
        ExecContext { ui, ws }
    }
}

/// Behavior of a leaf instruction.
///
/// Implementations must return after bounded work; long waits poll the halt
/// flag (see [`Instruction::is_halt_requested`]). Runtime failures are
/// reported as [`ExecutionStatus::Failure`] plus a warning log, never as
/// panics.
pub trait Action: Send + Sync {
    /// Validate semantic configuration at setup time.
    fn setup(&self, _instr: &Instruction, _proc: &Procedure) -> Result<(), SetupError> {
        Ok(())
    }

    /// Establish a fresh starting state; called on the first tick after
    /// construction or a reset.
    fn init(&self) {}

    /// One tick of work.
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus;

    /// Cooperative halt notification, e.g. to cancel pending requests.
    fn halt(&self) {}

    /// Drop runtime state so the next tick starts from scratch.
    fn reset(&self) {}
}

pub(crate) struct RepeatState {
    pub(crate) child: Arc<Instruction>,
    pub(crate) max_count: Mutex<Option<u32>>,
    pub(crate) count: AtomicU32,
}

pub(crate) enum Behavior {
    Sequence(Vec<Arc<Instruction>>),
    Fallback(Vec<Arc<Instruction>>),
    Parallel(ParallelState),
    Inverter(Arc<Instruction>),
    ForceSuccess(Arc<Instruction>),
    Repeat(RepeatState),
    Action(Box<dyn Action>),
    Include(IncludeState),
}

/// One node of the instruction tree.
pub struct Instruction {
    id: InstructionId,
    type_tag: String,
    attrs: Mutex<AttributeHandler>,
    status: Mutex<ExecutionStatus>,
    halt_requested: AtomicBool,
    behavior: Behavior,
}

impl Instruction {
    pub(crate) fn with_behavior(type_tag: impl Into<String>, behavior: Behavior) -> Instruction {
        let mut attrs = AttributeHandler::new();
        attrs.define(constants::NAME, opseq_value::ValueType::String);
        attrs.define(constants::IS_ROOT, opseq_value::ValueType::Bool);
        Instruction {
            id: InstructionId(NEXT_INSTRUCTION_ID.fetch_add(1, Ordering::Relaxed)),
            type_tag: type_tag.into(),
            attrs: Mutex::new(attrs),
            status: Mutex::new(ExecutionStatus::NotStarted),
            halt_requested: AtomicBool::new(false),
            behavior,
        }
    }

    /// Create a leaf instruction over a custom action.
    pub fn leaf(type_tag: impl Into<String>, action: Box<dyn Action>) -> Instruction {
        Instruction::with_behavior(type_tag, Behavior::Action(action))
    }

    /// The instruction's unique identity.
    pub fn id(&self) -> InstructionId {
        self.id
    }

    /// The instruction's type tag, e.g. `Sequence`.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Structural category.
    pub fn category(&self) -> InstructionCategory {
        match &self.behavior {
            Behavior::Sequence(_) | Behavior::Fallback(_) | Behavior::Parallel(_) => {
                InstructionCategory::Compound
            }
            Behavior::Inverter(_) | Behavior::ForceSuccess(_) | Behavior::Repeat(_) => {
                InstructionCategory::Decorator
            }
            Behavior::Action(_) | Behavior::Include(_) => InstructionCategory::Action,
        }
    }

    /// The instruction's name attribute, empty when unset.
    pub fn name(&self) -> String {
        self.attrs
            .lock()
            .raw(constants::NAME)
            .unwrap_or_default()
            .to_string()
    }

    /// Set the name attribute.
    pub fn set_name(&self, name: &str) {
        self.attrs.lock().set_string(constants::NAME, name);
    }

    /// Supply an attribute; false on duplicates.
    pub fn add_attribute(&self, name: &str, value: &str) -> bool {
        self.attrs.lock().add_string(name, value)
    }

    /// True when the attribute was supplied.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attrs.lock().has(name)
    }

    /// The raw supplied string for an attribute.
    pub fn attribute_string(&self, name: &str) -> Option<String> {
        self.attrs.lock().raw(name).map(str::to_string)
    }

    /// Snapshot of all supplied attributes.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.attrs.lock().attributes().to_vec()
    }

    /// Run a closure with the attribute handler borrowed. Meant for
    /// instruction constructors defining their schema.
    pub fn with_attrs<R>(&self, f: impl FnOnce(&mut AttributeHandler) -> R) -> R {
        f(&mut self.attrs.lock())
    }

    /// Children in tree order; empty for leaves.
    pub fn children(&self) -> &[Arc<Instruction>] {
        match &self.behavior {
            Behavior::Sequence(children) | Behavior::Fallback(children) => children,
            Behavior::Parallel(state) => &state.children,
            Behavior::Inverter(child) | Behavior::ForceSuccess(child) => {
                std::slice::from_ref(child)
            }
            Behavior::Repeat(state) => std::slice::from_ref(&state.child),
            Behavior::Action(_) | Behavior::Include(_) => &[],
        }
    }

    /// Current execution status.
    pub fn status(&self) -> ExecutionStatus {
        *self.status.lock()
    }

    pub(crate) fn set_status(&self, status: ExecutionStatus) {
        *self.status.lock() = status;
    }

    /// Whether a halt was requested and not yet cleared by a reset.
    pub fn is_halt_requested(&self) -> bool {
        self.halt_requested.load(Ordering::SeqCst)
    }

    /// Validate attributes and configure this node and its subtree.
    pub fn setup(&self, proc: &Procedure) -> Result<(), SetupError> {
        let failed = {
            let mut attrs = self.attrs.lock();
            if attrs.validate() {
                None
            } else {
                Some(attrs.failed_constraints().to_vec())
            }
        };
        if let Some(failed) = failed {
            return Err(SetupError::AttributeValidation {
                context: self.setup_prolog(),
                failed,
            });
        }
        for child in self.children() {
            child.setup(proc)?;
        }
        match &self.behavior {
            Behavior::Parallel(state) => state.configure(self)?,
            Behavior::Repeat(state) => {
                let max_count = if self.has_attribute(constants::MAX_COUNT) {
                    let parsed = { self.attrs.lock().value_as::<u32>(constants::MAX_COUNT) };
                    let count = parsed.map_err(|e| {
                        SetupError::Instruction(format!("{}{}", self.setup_prolog(), e))
                    })?;
                    Some(count)
                } else {
                    None
                };
                *state.max_count.lock() = max_count;
            }
            Behavior::Action(action) => action.setup(self, proc)?,
            Behavior::Include(state) => state.setup(self, proc)?,
            _ => {}
        }
        Ok(())
    }

    /// One tick: run the init hook on the first call, execute the behavior,
    /// and notify the observer about status transitions.
    pub fn execute_single(&self, ctx: &ExecContext) {
        if self.status() == ExecutionStatus::NotStarted {
            self.init();
            self.set_status(ExecutionStatus::NotFinished);
            ctx.ui.update_instruction_status(self);
        }
        let before = self.status();
        let status = self.execute_impl(ctx);
        self.set_status(status);
        if status != before {
            ctx.ui.update_instruction_status(self);
        }
    }

    /// Request cooperative termination of this subtree.
    pub fn halt(&self) {
        self.halt_requested.store(true, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Action(action) => action.halt(),
            Behavior::Include(state) => state.halt(),
            _ => {
                for child in self.children() {
                    child.halt();
                }
            }
        }
    }

    /// Return the subtree to [`ExecutionStatus::NotStarted`], joining any
    /// worker threads first and clearing halt flags.
    pub fn reset(&self) {
        match &self.behavior {
            Behavior::Parallel(state) => state.reset(self),
            Behavior::Repeat(state) => {
                state.count.store(0, Ordering::SeqCst);
                state.child.reset();
            }
            Behavior::Action(action) => action.reset(),
            Behavior::Include(state) => state.reset(),
            _ => {
                for child in self.children() {
                    child.reset();
                }
            }
        }
        self.set_status(ExecutionStatus::NotStarted);
        self.halt_requested.store(false, Ordering::SeqCst);
    }

    /// Collect the identities of the leaf instructions the next tick will
    /// touch. Feeds breakpoint handling.
    pub fn next_leaves(&self, out: &mut Vec<InstructionId>) {
        if self.status().is_finished() {
            return;
        }
        match &self.behavior {
            Behavior::Sequence(children) => {
                for child in children {
                    match child.status() {
                        ExecutionStatus::Success => continue,
                        ExecutionStatus::Failure => return,
                        _ => {
                            child.next_leaves(out);
                            return;
                        }
                    }
                }
            }
            Behavior::Fallback(children) => {
                for child in children {
                    match child.status() {
                        ExecutionStatus::Failure => continue,
                        ExecutionStatus::Success => return,
                        _ => {
                            child.next_leaves(out);
                            return;
                        }
                    }
                }
            }
            Behavior::Parallel(state) => {
                for child in &state.children {
                    if child.status().needs_execute() {
                        child.next_leaves(out);
                    }
                }
            }
            Behavior::Inverter(child) | Behavior::ForceSuccess(child) => {
                if child.status().is_finished() {
                    out.push(self.id);
                } else {
                    child.next_leaves(out);
                }
            }
            Behavior::Repeat(state) => {
                if state.child.status().is_finished() {
                    out.push(self.id);
                } else {
                    state.child.next_leaves(out);
                }
            }
            Behavior::Action(_) | Behavior::Include(_) => out.push(self.id),
        }
    }

    /// Substitute `$key` placeholder attribute values across the subtree
    /// from the given source map. Returns false when a placeholder has no
    /// source entry.
    pub fn substitute_placeholders(&self, source: &[(String, String)]) -> bool {
        let mut ok = self.attrs.lock().substitute_placeholders(source);
        for child in self.children() {
            ok = child.substitute_placeholders(source) && ok;
        }
        ok
    }

    /// Resolve an attribute into a native value at tick time.
    ///
    /// Variable-reference attributes read the variable's current value from
    /// the workspace and convert; literals parse against the definition.
    /// The error carries a loggable message.
    pub fn attribute_value<T: FromValue>(
        &self,
        name: &str,
        ctx: &ExecContext,
    ) -> Result<T, String> {
        let info = { self.attrs.lock().value_info(name) };
        let info =
            info.ok_or_else(|| format!("{}missing attribute [{name}]", self.warning_prolog()))?;
        if info.is_variable {
            let value = ctx.ws.get(&info.text).ok_or_else(|| {
                format!(
                    "{}could not read variable [{}] from workspace",
                    self.warning_prolog(),
                    info.text
                )
            })?;
            T::from_value(&value).map_err(|e| {
                format!(
                    "{}variable [{}] has unusable value: {e}",
                    self.warning_prolog(),
                    info.text
                )
            })
        } else {
            let parsed = { self.attrs.lock().value(name) };
            let value = parsed.map_err(|e| {
                format!("{}could not parse attribute [{name}]: {e}", self.warning_prolog())
            })?;
            T::from_value(&value).map_err(|e| {
                format!("{}attribute [{name}] has unusable value: {e}", self.warning_prolog())
            })
        }
    }

    /// [`Instruction::attribute_value`] with a default for absent attributes.
    pub fn attribute_value_or<T: FromValue>(
        &self,
        name: &str,
        ctx: &ExecContext,
        default: T,
    ) -> Result<T, String> {
        if !self.has_attribute(name) {
            return Ok(default);
        }
        self.attribute_value(name, ctx)
    }

    /// Write a value back through a variable-name attribute.
    pub fn set_attribute_target(
        &self,
        name: &str,
        ctx: &ExecContext,
        value: &Value,
    ) -> Result<(), String> {
        let info = { self.attrs.lock().value_info(name) };
        let info =
            info.ok_or_else(|| format!("{}missing attribute [{name}]", self.warning_prolog()))?;
        if !info.is_variable {
            return Err(format!(
                "{}attribute [{name}] does not name a variable",
                self.warning_prolog()
            ));
        }
        if !ctx.ws.set(&info.text, value) {
            return Err(format!(
                "{}could not write variable [{}] to workspace",
                self.warning_prolog(),
                info.text
            ));
        }
        Ok(())
    }

    /// The workspace path a variable-category attribute names.
    pub fn attribute_variable_path(&self, name: &str) -> Option<String> {
        let info = self.attrs.lock().value_info(name)?;
        info.is_variable.then_some(info.text)
    }

    /// Prolog for error logs, naming the instruction and its type.
    pub fn error_prolog(&self) -> String {
        format!(
            "Instruction {}of type <{}> error: ",
            wrap_optional_name(&self.name()),
            self.type_tag
        )
    }

    /// Prolog for warning logs, naming the instruction and its type.
    pub fn warning_prolog(&self) -> String {
        format!(
            "Instruction {}of type <{}> warning: ",
            wrap_optional_name(&self.name()),
            self.type_tag
        )
    }

    fn setup_prolog(&self) -> String {
        format!(
            "Setup of instruction {}of type <{}> failed: ",
            wrap_optional_name(&self.name()),
            self.type_tag
        )
    }

    fn init(&self) {
        match &self.behavior {
            Behavior::Parallel(state) => state.init_wrappers(),
            Behavior::Repeat(state) => state.count.store(0, Ordering::SeqCst),
            Behavior::Action(action) => action.init(),
            _ => {}
        }
    }

    fn execute_impl(&self, ctx: &ExecContext) -> ExecutionStatus {
        match &self.behavior {
            Behavior::Sequence(children) => {
                execute_ordered(children, ctx, ExecutionStatus::Success)
            }
            Behavior::Fallback(children) => {
                execute_ordered(children, ctx, ExecutionStatus::Failure)
            }
            Behavior::Parallel(state) => state.execute(self, ctx),
            Behavior::Inverter(child) => {
                if !child.status().is_finished() {
                    child.execute_single(ctx);
                }
                match child.status() {
                    ExecutionStatus::Success => ExecutionStatus::Failure,
                    ExecutionStatus::Failure => ExecutionStatus::Success,
                    status => status,
                }
            }
            Behavior::ForceSuccess(child) => {
                if !child.status().is_finished() {
                    child.execute_single(ctx);
                }
                match child.status() {
                    status if status.is_finished() => ExecutionStatus::Success,
                    status => status,
                }
            }
            Behavior::Repeat(state) => execute_repeat(state, ctx),
            Behavior::Action(action) => action.execute(self, ctx),
            Behavior::Include(state) => state.execute(ctx),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("id", &self.id)
            .field("type_tag", &self.type_tag)
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

/// Shared skip/propagate iteration of sequences and fallbacks.
///
/// `skip_on` is the status that lets iteration move past a child (SUCCESS
/// for sequences, FAILURE for fallbacks); the opposite terminal status
/// propagates immediately. All children skipped means the compound finishes
/// with `skip_on`.
fn execute_ordered(
    children: &[Arc<Instruction>],
    ctx: &ExecContext,
    skip_on: ExecutionStatus,
) -> ExecutionStatus {
    if children.is_empty() {
        return skip_on;
    }
    for child in children {
        let status = child.status();
        if status == skip_on {
            continue;
        }
        if status.is_finished() {
            return status;
        }
        child.execute_single(ctx);
        break;
    }
    for child in children {
        let status = child.status();
        if status == skip_on {
            continue;
        }
        if status.is_finished() {
            return status;
        }
        return ExecutionStatus::NotFinished;
    }
    skip_on
}

fn execute_repeat(state: &RepeatState, ctx: &ExecContext) -> ExecutionStatus {
    let max_count = *state.max_count.lock();
    if max_count == Some(0) {
        return ExecutionStatus::Success;
    }
    // At most one child tick per parent tick keeps scheduling cooperative.
    if !state.child.status().is_finished() {
        state.child.execute_single(ctx);
    }
    match state.child.status() {
        ExecutionStatus::Failure => ExecutionStatus::Failure,
        ExecutionStatus::Success => {
            let done = state.count.fetch_add(1, Ordering::SeqCst) + 1;
            if max_count == Some(done) {
                ExecutionStatus::Success
            } else {
                state.child.reset();
                ExecutionStatus::NotFinished
            }
        }
        status => status,
    }
}

fn wrap_optional_name(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!("[{name}] ")
    }
}

/// Flatten a subtree in breadth-first order, root included.
pub fn flatten_tree(root: &Arc<Instruction>) -> Vec<Arc<Instruction>> {
    let mut queue: VecDeque<Arc<Instruction>> = VecDeque::from([Arc::clone(root)]);
    let mut result = Vec::new();
    while let Some(instr) = queue.pop_front() {
        for child in instr.children() {
            queue.push_back(Arc::clone(child));
        }
        result.push(instr);
    }
    result
}
