//! The root container: preamble, workspace and top-level instructions.

use crate::attr::parse_attribute_string;
use crate::constants;
use crate::error::SetupError;
use crate::instruction::{ExecContext, ExecutionStatus, Instruction, InstructionId, flatten_tree};
use crate::observer::Observer;
use crate::workspace::Workspace;
use opseq_value::{Value, ValueType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One preamble type registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRegistration {
    /// Inline JSON type description.
    JsonType(String),
    /// Path of a JSON file holding the type description, resolved relative
    /// to the procedure file.
    JsonFile(String),
}

/// Preamble of a procedure: type registrations and plugin paths, applied in
/// order before the workspace is set up.
#[derive(Debug, Clone, Default)]
pub struct Preamble {
    /// Type registrations in declaration order.
    pub type_registrations: Vec<TypeRegistration>,
    /// Plugin paths in declaration order. The engine records them; loading
    /// is left to the embedding application.
    pub plugin_paths: Vec<String>,
}

/// Parses procedure documents on behalf of [`ProcedureStore`].
pub trait ProcedureLoader: Send + Sync {
    /// Parse a document into a procedure. `filename` is the path the text
    /// was read from, for relative-path resolution.
    fn parse(&self, text: &str, filename: Option<&Path>) -> Result<Procedure, SetupError>;
}

/// Per-procedure cache of included procedure documents.
///
/// The file behind an include path is read once and cached; every include
/// instantiates its own procedure from the cached text, so sibling includes
/// share the read but not workspace state.
pub struct ProcedureStore {
    loader: Mutex<Option<Arc<dyn ProcedureLoader>>>,
    files: Mutex<HashMap<PathBuf, String>>,
}

impl ProcedureStore {
    /// Create a store with no loader; includes fail until one is installed.
    pub fn new() -> Self {
        ProcedureStore {
            loader: Mutex::new(None),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Install the document loader used for includes.
    pub fn set_loader(&self, loader: Arc<dyn ProcedureLoader>) {
        *self.loader.lock() = Some(loader);
    }

    /// Instantiate the procedure behind an include path.
    pub fn instantiate(
        &self,
        filename: &str,
        base_dir: Option<&Path>,
    ) -> Result<Procedure, SetupError> {
        let path = resolve_path(base_dir, filename);
        let text = {
            let mut files = self.files.lock();
            match files.get(&path) {
                Some(text) => text.clone(),
                None => {
                    let text = std::fs::read_to_string(&path).map_err(|e| {
                        SetupError::Procedure(format!(
                            "could not read procedure file [{}]: {e}",
                            path.display()
                        ))
                    })?;
                    files.insert(path.clone(), text.clone());
                    text
                }
            }
        };
        let loader = self
            .loader
            .lock()
            .clone()
            .ok_or_else(|| SetupError::Procedure("no procedure loader installed".to_string()))?;
        loader.parse(&text, Some(&path))
    }
}

impl Default for ProcedureStore {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_path(base_dir: Option<&Path>, filename: &str) -> PathBuf {
    let file = Path::new(filename);
    match base_dir {
        Some(dir) if file.is_relative() => dir.join(file),
        _ => file.to_path_buf(),
    }
}

/// Behavior state of an include instruction.
///
/// Resolves a sub-procedure from the parent's store at setup time and
/// executes its root against the sub-procedure's own workspace; variable
/// scope never leaks across the include boundary.
pub struct IncludeState {
    resolved: Mutex<Option<Arc<Procedure>>>,
}

impl IncludeState {
    pub(crate) fn new() -> Self {
        IncludeState {
            resolved: Mutex::new(None),
        }
    }

    pub(crate) fn setup(&self, instr: &Instruction, proc: &Procedure) -> Result<(), SetupError> {
        let Some(filename) = instr.attribute_string(constants::FILE) else {
            return Err(SetupError::Instruction(format!(
                "{}missing attribute [{}]",
                instr.error_prolog(),
                constants::FILE
            )));
        };
        let store = proc.store();
        let sub = store.instantiate(&filename, proc.base_dir().as_deref())?;
        sub.share_store(store);
        // The include's own attributes feed `$key` placeholders of the
        // included tree before it is set up.
        if let Some(root) = sub.root_instruction() {
            if !root.substitute_placeholders(&instr.attributes()) {
                return Err(SetupError::Instruction(format!(
                    "{}unresolved placeholder attributes in [{filename}]",
                    instr.error_prolog()
                )));
            }
        }
        sub.setup()?;
        *self.resolved.lock() = Some(Arc::new(sub));
        Ok(())
    }

    pub(crate) fn execute(&self, ctx: &ExecContext) -> ExecutionStatus {
        let sub = self.resolved.lock().clone();
        let Some(sub) = sub else {
            return ExecutionStatus::Failure;
        };
        let Some(root) = sub.root_instruction() else {
            return ExecutionStatus::Failure;
        };
        let sub_ctx = ExecContext::new(Arc::clone(&ctx.ui), sub.workspace());
        root.execute_single(&sub_ctx);
        root.status()
    }

    pub(crate) fn halt(&self) {
        if let Some(sub) = self.resolved.lock().clone() {
            sub.halt();
        }
    }

    pub(crate) fn reset(&self) {
        if let Some(sub) = self.resolved.lock().clone() {
            let _ = sub.reset();
        }
    }
}

/// A root instruction, a workspace and a preamble.
pub struct Procedure {
    attrs: Mutex<crate::attr::AttributeHandler>,
    instructions: Mutex<Vec<Arc<Instruction>>>,
    workspace: Workspace,
    preamble: Mutex<Preamble>,
    store: Mutex<Arc<ProcedureStore>>,
    filename: Mutex<Option<PathBuf>>,
}

impl Procedure {
    /// Create an empty procedure.
    pub fn new() -> Self {
        let mut attrs = crate::attr::AttributeHandler::new();
        attrs.define(constants::NAME, ValueType::String);
        attrs.define(constants::TICK_TIMEOUT, ValueType::Float64);
        Procedure {
            attrs: Mutex::new(attrs),
            instructions: Mutex::new(Vec::new()),
            workspace: Workspace::new(),
            preamble: Mutex::new(Preamble::default()),
            store: Mutex::new(Arc::new(ProcedureStore::new())),
            filename: Mutex::new(None),
        }
    }

    /// Set the file this procedure was parsed from; relative paths resolve
    /// against its directory.
    pub fn set_filename(&self, path: PathBuf) {
        self.workspace
            .set_base_dir(path.parent().map(Path::to_path_buf));
        *self.filename.lock() = Some(path);
    }

    /// The file this procedure was parsed from.
    pub fn filename(&self) -> Option<PathBuf> {
        self.filename.lock().clone()
    }

    /// Directory of the procedure file.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.workspace.base_dir()
    }

    /// The procedure's display name: the `name` attribute, else the
    /// filename, else empty.
    pub fn name(&self) -> String {
        if let Some(name) = self.attrs.lock().raw(constants::NAME) {
            return name.to_string();
        }
        self.filename()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    /// Handle to the procedure's workspace.
    pub fn workspace(&self) -> Workspace {
        self.workspace.clone()
    }

    /// The include cache shared by this procedure tree.
    pub fn store(&self) -> Arc<ProcedureStore> {
        self.store.lock().clone()
    }

    /// Adopt a parent's include cache so sibling includes share reads.
    pub fn share_store(&self, store: Arc<ProcedureStore>) {
        *self.store.lock() = store;
    }

    /// Supply a procedure attribute; false on duplicates.
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

    /// Append a type registration to the preamble.
    pub fn add_type_registration(&self, registration: TypeRegistration) {
        self.preamble.lock().type_registrations.push(registration);
    }

    /// Append a plugin path to the preamble.
    pub fn add_plugin_path(&self, path: &str) {
        self.preamble.lock().plugin_paths.push(path.to_string());
    }

    /// Snapshot of the preamble.
    pub fn preamble(&self) -> Preamble {
        self.preamble.lock().clone()
    }

    /// Add a named variable to the workspace.
    pub fn add_variable(
        &self,
        name: &str,
        var: crate::variable::Variable,
    ) -> Result<(), crate::error::InvalidOperationError> {
        self.workspace.add(name, var)
    }

    /// Append a top-level instruction.
    pub fn push_instruction(&self, instruction: Instruction) {
        self.instructions.lock().push(Arc::new(instruction));
    }

    /// Top-level instructions in declaration order.
    pub fn top_instructions(&self) -> Vec<Arc<Instruction>> {
        self.instructions.lock().clone()
    }

    /// The root: the unique top-level instruction, or the one whose
    /// `isRoot` attribute parses to true.
    pub fn root_instruction(&self) -> Option<Arc<Instruction>> {
        let instructions = self.instructions.lock();
        if instructions.len() == 1 {
            return instructions.first().cloned();
        }
        instructions
            .iter()
            .find(|instr| has_root_attribute(instr))
            .cloned()
    }

    /// Validate attributes, apply the preamble, set up the workspace and the
    /// root instruction.
    pub fn setup(&self) -> Result<(), SetupError> {
        {
            let mut attrs = self.attrs.lock();
            if !attrs.validate() {
                return Err(SetupError::Procedure(format!(
                    "Procedure setup failed: failed attribute constraint(s): {}",
                    attrs.failed_constraints().join("; ")
                )));
            }
        }
        self.setup_preamble()?;
        self.workspace.setup()?;
        let Some(root) = self.root_instruction() else {
            return Err(SetupError::Procedure(
                "Procedure setup failed: no root instruction".to_string(),
            ));
        };
        root.setup(self)
    }

    fn setup_preamble(&self) -> Result<(), SetupError> {
        let preamble = self.preamble();
        let registry_err = |repr: &str, e: &dyn std::fmt::Display| {
            SetupError::Procedure(format!("could not parse type registration [{repr}]: {e}"))
        };
        for registration in &preamble.type_registrations {
            let registry = self.workspace.type_registry();
            let ty = match registration {
                TypeRegistration::JsonType(repr) => opseq_value::parse_type(repr, &registry)
                    .map_err(|e| registry_err(repr, &e))?,
                TypeRegistration::JsonFile(file) => {
                    let path = resolve_path(self.base_dir().as_deref(), file);
                    let text = std::fs::read_to_string(&path).map_err(|e| {
                        SetupError::Procedure(format!(
                            "could not read type file [{}]: {e}",
                            path.display()
                        ))
                    })?;
                    opseq_value::parse_type(text.trim(), &registry)
                        .map_err(|e| registry_err(file, &e))?
                }
            };
            let ValueType::Struct(st) = &ty else {
                return Err(SetupError::Procedure(format!(
                    "only structure types can be registered, got <{ty}>"
                )));
            };
            let name = st.name.clone();
            if !self.workspace.register_type(&name, ty) {
                return Err(SetupError::Procedure(format!(
                    "type [{name}] conflicts with an existing registration"
                )));
            }
        }
        Ok(())
    }

    /// Tick the root once.
    pub fn execute_single(&self, ui: &Arc<dyn Observer>) {
        if let Some(root) = self.root_instruction() {
            let ctx = ExecContext::new(Arc::clone(ui), self.workspace());
            root.execute_single(&ctx);
        }
    }

    /// Request cooperative termination of the whole tree.
    pub fn halt(&self) {
        if let Some(root) = self.root_instruction() {
            root.halt();
        }
    }

    /// Tear the workspace down, reset the tree (includes reset their own
    /// sub-procedures) and reinitialize the workspace.
    pub fn reset(&self) -> Result<(), SetupError> {
        self.workspace.teardown();
        if let Some(root) = self.root_instruction() {
            root.reset();
        }
        self.workspace.setup()
    }

    /// Execution status of the root; a procedure without instructions counts
    /// as succeeded.
    pub fn status(&self) -> ExecutionStatus {
        self.root_instruction()
            .map(|root| root.status())
            .unwrap_or(ExecutionStatus::Success)
    }

    /// The sleep applied between ticks while the root reports `Running`.
    /// Read from the `tickTimeout` attribute (seconds), default 100 ms.
    pub fn tick_timeout(&self) -> Duration {
        if let Ok(seconds) = self.attrs.lock().value_as::<f64>(constants::TICK_TIMEOUT) {
            if seconds > 0.001 {
                return Duration::from_secs_f64(seconds);
            }
        }
        Duration::from_millis(constants::DEFAULT_TICK_TIMEOUT_MS)
    }

    /// Identities of the leaves the next tick will touch; empty when the
    /// root is finished.
    pub fn next_leaves(&self) -> Vec<InstructionId> {
        let mut out = Vec::new();
        if let Some(root) = self.root_instruction() {
            root.next_leaves(&mut out);
        }
        out
    }

    /// Every instruction reachable from the root, in breadth-first order.
    pub fn flatten_instructions(&self) -> Vec<Arc<Instruction>> {
        match self.root_instruction() {
            Some(root) => flatten_tree(&root),
            None => Vec::new(),
        }
    }

    /// Find a reachable instruction by identity.
    pub fn find_instruction(&self, id: InstructionId) -> Option<Arc<Instruction>> {
        self.flatten_instructions()
            .into_iter()
            .find(|instr| instr.id() == id)
    }

    /// Tear down the workspace and reset the tree without reinitializing.
    pub fn teardown(&self) {
        self.workspace.teardown();
        if let Some(root) = self.root_instruction() {
            root.reset();
        }
    }
}

impl Default for Procedure {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Procedure {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn has_root_attribute(instr: &Instruction) -> bool {
    let Some(repr) = instr.attribute_string(constants::IS_ROOT) else {
        return false;
    };
    matches!(
        parse_attribute_string(&ValueType::Bool, &repr),
        Ok(Value::Bool(true))
    )
}
