//! Workspace variables.
//!
//! A [`Variable`] pairs an attribute schema with a [`VariableKind`] that
//! holds the actual backing state (an in-memory slot, a JSON file, ...).
//! The variable owns field-path navigation and change notification; kinds
//! only read and write whole values.

use crate::attr::AttributeHandler;
use crate::constants;
use crate::error::SetupError;
use opseq_value::{TypeRegistry, Value, ValueType};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback invoked on every value update of a variable.
pub type NotifyFn = Box<dyn Fn(&Value, bool) + Send + Sync>;

/// A setup/teardown pair shared between variables.
///
/// Variables returning the same identifier from setup share one execution of
/// the setup and teardown closures per workspace.
pub struct SharedSetup {
    /// Identifier grouping variables that share this setup.
    pub identifier: String,
    /// Runs once per workspace per identifier, after per-variable setup.
    pub setup: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Runs once per workspace per identifier, before per-variable teardown.
    pub teardown: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// Everything a kind may consult while configuring itself.
pub struct VariableSetupContext<'a> {
    /// The variable's validated attributes.
    pub attrs: &'a AttributeHandler,
    /// The workspace's type registry.
    pub registry: &'a TypeRegistry,
    /// Directory of the owning procedure's file, for relative paths.
    pub base_dir: Option<&'a Path>,
}

/// Backing state of a variable.
pub trait VariableKind: Send + Sync {
    /// Configure from attributes. May publish a [`SharedSetup`].
    fn setup(&self, ctx: &VariableSetupContext<'_>) -> Result<Option<SharedSetup>, SetupError>;

    /// Release backing state on workspace shutdown.
    fn teardown(&self) {}

    /// Read the full current value; `None` when unavailable.
    fn read(&self) -> Option<Value>;

    /// Write the full value. Returns the stored value for notification, or
    /// `None` when the write was refused.
    fn write(&self, value: &Value) -> Option<Value>;

    /// Whether the backing state currently holds a defined value.
    fn is_available(&self) -> bool;

    /// Drop any runtime state beyond teardown.
    fn reset(&self) {}
}

/// A named, typed slot in a workspace.
pub struct Variable {
    type_tag: String,
    attrs: Mutex<AttributeHandler>,
    kind: Box<dyn VariableKind>,
    setup_done: AtomicBool,
    notify: Mutex<Option<NotifyFn>>,
}

impl Variable {
    /// Create a variable of the given type tag over a kind.
    ///
    /// A `name` attribute definition is always present.
    pub fn new(type_tag: impl Into<String>, kind: Box<dyn VariableKind>) -> Self {
        let mut attrs = AttributeHandler::new();
        attrs.define(constants::NAME, ValueType::String);
        Variable {
            type_tag: type_tag.into(),
            attrs: Mutex::new(attrs),
            kind,
            setup_done: AtomicBool::new(false),
            notify: Mutex::new(None),
        }
    }

    /// The variable's type tag, e.g. `Local`.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// The variable's name attribute, empty when unset.
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

    /// Run a closure with the attribute handler borrowed.
    pub fn with_attrs<R>(&self, f: impl FnOnce(&mut AttributeHandler) -> R) -> R {
        f(&mut self.attrs.lock())
    }

    /// Validate attributes and configure the kind.
    pub fn setup(
        &self,
        registry: &TypeRegistry,
        base_dir: Option<&Path>,
    ) -> Result<Option<SharedSetup>, SetupError> {
        let mut attrs = self.attrs.lock();
        if !attrs.validate() {
            let failed = attrs.failed_constraints().to_vec();
            drop(attrs);
            return Err(SetupError::AttributeValidation {
                context: self.setup_prolog(),
                failed,
            });
        }
        let ctx = VariableSetupContext {
            attrs: &attrs,
            registry,
            base_dir,
        };
        let shared = self.kind.setup(&ctx)?;
        drop(attrs);
        self.setup_done.store(true, Ordering::SeqCst);
        match self.kind.read() {
            Some(value) => self.notify(&value, true),
            None => self.notify(&Value::Empty, false),
        }
        Ok(shared)
    }

    /// Release backing state; the variable needs setup again afterwards.
    pub fn teardown(&self) {
        self.kind.teardown();
        self.setup_done.store(false, Ordering::SeqCst);
    }

    /// Forget runtime state and the last validation outcome.
    pub fn reset(&self) {
        self.kind.reset();
        self.attrs.lock().clear_failed_constraints();
        self.setup_done.store(false, Ordering::SeqCst);
    }

    /// Read the value at a field path (empty path: the whole value),
    /// `None` when the variable is not set up, unavailable, or the path
    /// does not resolve.
    pub fn get_value(&self, field_path: &str) -> Option<Value> {
        if !self.is_setup() {
            return None;
        }
        let full = self.kind.read()?;
        if field_path.is_empty() {
            return Some(full);
        }
        full.get_field(field_path).ok()
    }

    /// Write the value at a field path (empty path: the whole value).
    /// Notifies listeners on success.
    pub fn set_value(&self, field_path: &str, value: &Value) -> bool {
        if !self.is_setup() {
            return false;
        }
        let stored = if field_path.is_empty() {
            self.kind.write(value)
        } else {
            let Some(mut full) = self.kind.read() else {
                return false;
            };
            if full.set_field(field_path, value).is_err() {
                return false;
            }
            self.kind.write(&full)
        };
        match stored {
            Some(stored) => {
                self.notify(&stored, true);
                true
            }
            None => false,
        }
    }

    /// Whether the variable currently holds a defined, connected value.
    pub fn is_available(&self) -> bool {
        self.is_setup() && self.kind.is_available()
    }

    /// Whether setup completed since the last teardown.
    pub fn is_setup(&self) -> bool {
        self.setup_done.load(Ordering::SeqCst)
    }

    /// Install the update callback. The workspace does this on add.
    pub fn set_notify(&self, notify: NotifyFn) {
        *self.notify.lock() = Some(notify);
    }

    fn notify(&self, value: &Value, connected: bool) {
        let guard = self.notify.lock();
        if let Some(cb) = guard.as_ref() {
            cb(value, connected);
        }
    }

    fn setup_prolog(&self) -> String {
        format!(
            "Setup of variable [{}] of type <{}> failed: ",
            self.name(),
            self.type_tag
        )
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("type_tag", &self.type_tag)
            .field("name", &self.name())
            .field("setup_done", &self.is_setup())
            .finish()
    }
}
