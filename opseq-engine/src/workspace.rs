//! The shared variable scope of a procedure.
//!
//! A [`Workspace`] is an insertion-ordered map of named [`Variable`]s plus a
//! type registry for user-defined structure types. It owns change
//! notification: a successful set invokes the generic listeners in insertion
//! order, then the per-name listeners in insertion order, under the listener
//! lock (never under the variable map lock). Listeners must not call back
//! into the workspace; they should defer work.
//!
//! The handle is cheaply cloneable and thread-safe; wrapper worker threads
//! clone it freely.

use crate::error::{InvalidOperationError, SetupError};
use crate::variable::Variable;
use indexmap::IndexMap;
use opseq_value::{TypeRegistry, Value, ValueType, split_leading_name};
use parking_lot::{Condvar, Mutex};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Listener invoked on every variable change: `(name, value, connected)`.
pub type GenericListener = Box<dyn Fn(&str, &Value, bool) + Send + Sync>;
/// Listener invoked on changes of one named variable.
pub type NamedListener = Box<dyn Fn(&Value, bool) + Send + Sync>;

type SharedAction = Arc<dyn Fn() + Send + Sync>;

/// The shared, typed variable scope of a procedure.
#[derive(Clone)]
pub struct Workspace {
    inner: Arc<Inner>,
}

struct Inner {
    base_dir: Mutex<Option<PathBuf>>,
    vars: Mutex<IndexMap<String, Arc<Variable>>>,
    listeners: Arc<Listeners>,
    registry: Mutex<TypeRegistry>,
    shared_teardowns: Mutex<Vec<SharedAction>>,
    setup_done: AtomicBool,
    update_generation: Mutex<u64>,
    update_cv: Condvar,
}

struct Listeners {
    table: Mutex<ListenerTable>,
}

#[derive(Default)]
struct ListenerTable {
    next_token: u64,
    generic: Vec<(u64, GenericListener)>,
    named: Vec<(u64, String, NamedListener)>,
}

/// De-registration guard for a workspace listener; unregisters on drop.
#[must_use = "dropping the guard immediately unregisters the listener"]
pub struct ListenerGuard {
    listeners: Weak<Listeners>,
    token: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut table = listeners.table.lock();
            table.generic.retain(|(token, _)| *token != self.token);
            table.named.retain(|(token, _, _)| *token != self.token);
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Workspace {
            inner: Arc::new(Inner {
                base_dir: Mutex::new(None),
                vars: Mutex::new(IndexMap::new()),
                listeners: Arc::new(Listeners {
                    table: Mutex::new(ListenerTable::default()),
                }),
                registry: Mutex::new(TypeRegistry::new()),
                shared_teardowns: Mutex::new(Vec::new()),
                setup_done: AtomicBool::new(false),
                update_generation: Mutex::new(0),
                update_cv: Condvar::new(),
            }),
        }
    }

    /// Set the directory relative file references resolve against.
    pub fn set_base_dir(&self, dir: Option<PathBuf>) {
        *self.inner.base_dir.lock() = dir;
    }

    /// The directory relative file references resolve against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.inner.base_dir.lock().clone()
    }

    /// Add a named variable; duplicate names are refused.
    pub fn add(&self, name: &str, var: Variable) -> Result<(), InvalidOperationError> {
        let mut vars = self.inner.vars.lock();
        if vars.contains_key(name) {
            return Err(InvalidOperationError(format!(
                "trying to add variable with name that already exists: [{name}]"
            )));
        }
        let weak = Arc::downgrade(&self.inner);
        let notify_name = name.to_string();
        var.set_notify(Box::new(move |value, connected| {
            if let Some(inner) = weak.upgrade() {
                inner.variable_updated(&notify_name, value, connected);
            }
        }));
        vars.insert(name.to_string(), Arc::new(var));
        Ok(())
    }

    /// Look up a variable by plain name.
    pub fn variable(&self, name: &str) -> Option<Arc<Variable>> {
        self.inner.vars.lock().get(name).cloned()
    }

    /// True when a variable with this name exists.
    pub fn has_variable(&self, name: &str) -> bool {
        self.inner.vars.lock().contains_key(name)
    }

    /// Variable names in insertion order.
    pub fn variable_names(&self) -> Vec<String> {
        self.inner.vars.lock().keys().cloned().collect()
    }

    /// Snapshot of the variables in insertion order.
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        self.inner.vars.lock().values().cloned().collect()
    }

    /// Set up every variable, running each shared setup identifier exactly
    /// once. Idempotent until the next teardown.
    pub fn setup(&self) -> Result<(), SetupError> {
        if self.inner.setup_done.load(Ordering::SeqCst) {
            return Ok(());
        }
        let vars = self.variables();
        let registry = self.type_registry();
        let base_dir = self.base_dir();
        let mut shared = Vec::new();
        for var in &vars {
            if let Some(actions) = var.setup(&registry, base_dir.as_deref())? {
                if !actions.identifier.is_empty() {
                    shared.push(actions);
                }
            }
        }
        let mut setup_identifiers = Vec::new();
        let mut teardown_identifiers = Vec::new();
        let mut setups = Vec::new();
        {
            let mut teardowns = self.inner.shared_teardowns.lock();
            teardowns.clear();
            for actions in shared {
                if let Some(setup) = actions.setup {
                    if !setup_identifiers.contains(&actions.identifier) {
                        setup_identifiers.push(actions.identifier.clone());
                        setups.push(setup);
                    }
                }
                if let Some(teardown) = actions.teardown {
                    if !teardown_identifiers.contains(&actions.identifier) {
                        teardown_identifiers.push(actions.identifier.clone());
                        teardowns.push(teardown);
                    }
                }
            }
        }
        for setup in setups {
            setup();
        }
        self.inner.setup_done.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Tear down: shared teardowns first, then every variable.
    pub fn teardown(&self) {
        self.inner.setup_done.store(false, Ordering::SeqCst);
        let teardowns: Vec<SharedAction> = {
            let mut guard = self.inner.shared_teardowns.lock();
            guard.drain(..).collect()
        };
        for teardown in teardowns {
            teardown();
        }
        for var in self.variables() {
            var.teardown();
        }
    }

    /// Whether setup completed since the last teardown.
    pub fn is_setup(&self) -> bool {
        self.inner.setup_done.load(Ordering::SeqCst)
    }

    /// Read a value by `name[.field][index]` path.
    pub fn get(&self, path: &str) -> Option<Value> {
        let (name, field_path) = split_leading_name(path);
        self.variable(name)?.get_value(field_path)
    }

    /// Write a value by `name[.field][index]` path.
    pub fn set(&self, path: &str, value: &Value) -> bool {
        let (name, field_path) = split_leading_name(path);
        match self.variable(name) {
            Some(var) => var.set_value(field_path, value),
            None => false,
        }
    }

    /// Block until the named variable's availability equals `availability`
    /// or the timeout elapses. Returns the final comparison outcome.
    pub fn wait_for(&self, name: &str, timeout: Duration, availability: bool) -> bool {
        let Some(var) = self.variable(name) else {
            return false;
        };
        let deadline = Instant::now() + timeout;
        let mut generation = self.inner.update_generation.lock();
        loop {
            if var.is_available() == availability {
                return true;
            }
            if self
                .inner
                .update_cv
                .wait_until(&mut generation, deadline)
                .timed_out()
            {
                return var.is_available() == availability;
            }
        }
    }

    /// Register a user-defined type; succeeds when the name is free or bound
    /// to a structurally equal type.
    pub fn register_type(&self, name: &str, ty: ValueType) -> bool {
        self.inner.registry.lock().register(name, ty)
    }

    /// Snapshot of the type registry.
    pub fn type_registry(&self) -> TypeRegistry {
        self.inner.registry.lock().clone()
    }

    /// Register a listener for every variable change.
    pub fn register_generic_listener(&self, listener: GenericListener) -> ListenerGuard {
        let mut table = self.inner.listeners.table.lock();
        table.next_token += 1;
        let token = table.next_token;
        table.generic.push((token, listener));
        ListenerGuard {
            listeners: Arc::downgrade(&self.inner.listeners),
            token,
        }
    }

    /// Register a listener for changes of one named variable.
    pub fn register_listener(&self, name: &str, listener: NamedListener) -> ListenerGuard {
        let mut table = self.inner.listeners.table.lock();
        table.next_token += 1;
        let token = table.next_token;
        table.named.push((token, name.to_string(), listener));
        ListenerGuard {
            listeners: Arc::downgrade(&self.inner.listeners),
            token,
        }
    }
}

impl Inner {
    fn variable_updated(&self, name: &str, value: &Value, connected: bool) {
        {
            let table = self.listeners.table.lock();
            for (_, listener) in &table.generic {
                listener(name, value, connected);
            }
            for (_, listened_name, listener) in &table.named {
                if listened_name == name {
                    listener(value, connected);
                }
            }
        }
        let mut generation = self.update_generation.lock();
        *generation += 1;
        drop(generation);
        self.update_cv.notify_all();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let teardowns: Vec<SharedAction> = self.shared_teardowns.lock().drain(..).collect();
        for teardown in teardowns {
            teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::variable::{SharedSetup, VariableKind, VariableSetupContext};
    use crate::variables::local_variable;
    use std::sync::atomic::AtomicUsize;

    fn local(name: &str, ty: &str, value: &str) -> Variable {
        let var = local_variable();
        var.add_attribute(constants::NAME, name);
        var.add_attribute(constants::TYPE, ty);
        var.add_attribute(constants::VALUE, value);
        var
    }

    #[test]
    fn duplicate_names_are_refused() {
        let ws = Workspace::new();
        ws.add("a", local("a", "uint32", "1")).unwrap();
        assert!(ws.add("a", local("a", "uint32", "2")).is_err());
    }

    #[test]
    fn get_and_set_by_path() {
        let ws = Workspace::new();
        ws.add("a", local("a", r#"{"element": "uint8", "size": 2}"#, "[1, 2]"))
            .unwrap();
        ws.setup().unwrap();
        assert_eq!(ws.get("a[1]").unwrap(), Value::UInt8(2));
        assert!(ws.set("a[0]", &Value::UInt8(9)));
        assert_eq!(ws.get("a[0]").unwrap(), Value::UInt8(9));
        assert!(!ws.set("a[5]", &Value::UInt8(9)));
        assert!(!ws.set("missing", &Value::UInt8(9)));
        assert!(ws.get("missing").is_none());
    }

    #[test]
    fn listeners_fire_in_order_and_guards_unregister() {
        let ws = Workspace::new();
        ws.add("a", local("a", "uint32", "0")).unwrap();
        ws.setup().unwrap();

        let order = Arc::new(Mutex::new(Vec::<String>::new()));
        let generic_order = Arc::clone(&order);
        let generic_guard = ws.register_generic_listener(Box::new(move |name, _, _| {
            generic_order.lock().push(format!("generic:{name}"));
        }));
        let named_order = Arc::clone(&order);
        let named_guard = ws.register_listener(
            "a",
            Box::new(move |value, _| {
                named_order.lock().push(format!("named:{value}"));
            }),
        );

        assert!(ws.set("a", &Value::UInt32(5)));
        assert_eq!(
            order.lock().clone(),
            vec!["generic:a".to_string(), "named:5".to_string()]
        );

        drop(generic_guard);
        order.lock().clear();
        assert!(ws.set("a", &Value::UInt32(6)));
        assert_eq!(order.lock().clone(), vec!["named:6".to_string()]);
        drop(named_guard);
        order.lock().clear();
        assert!(ws.set("a", &Value::UInt32(7)));
        assert!(order.lock().is_empty());
    }

    #[test]
    fn wait_for_unblocks_on_availability() {
        let ws = Workspace::new();
        // No type/value: unavailable until first write.
        let var = local_variable();
        var.add_attribute(constants::NAME, "late");
        ws.add("late", var).unwrap();
        ws.setup().unwrap();

        assert!(!ws.wait_for("late", Duration::from_millis(50), true));

        let writer_ws = ws.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            assert!(writer_ws.set("late", &Value::Bool(true)));
        });
        assert!(ws.wait_for("late", Duration::from_secs(5), true));
        writer.join().unwrap();
        assert!(ws.wait_for("missing", Duration::from_millis(1), true) == false);
    }

    struct SharedKind {
        setup_count: Arc<AtomicUsize>,
        teardown_count: Arc<AtomicUsize>,
    }

    impl VariableKind for SharedKind {
        fn setup(
            &self,
            _ctx: &VariableSetupContext<'_>,
        ) -> Result<Option<SharedSetup>, crate::error::SetupError> {
            let setups = Arc::clone(&self.setup_count);
            let teardowns = Arc::clone(&self.teardown_count);
            Ok(Some(SharedSetup {
                identifier: "shared-backend".to_string(),
                setup: Some(Arc::new(move || {
                    setups.fetch_add(1, Ordering::SeqCst);
                })),
                teardown: Some(Arc::new(move || {
                    teardowns.fetch_add(1, Ordering::SeqCst);
                })),
            }))
        }

        fn read(&self) -> Option<Value> {
            Some(Value::Bool(true))
        }

        fn write(&self, value: &Value) -> Option<Value> {
            Some(value.clone())
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn shared_setup_runs_once_per_identifier() {
        let setups = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let ws = Workspace::new();
        for name in ["first", "second"] {
            let var = Variable::new(
                "Shared",
                Box::new(SharedKind {
                    setup_count: Arc::clone(&setups),
                    teardown_count: Arc::clone(&teardowns),
                }),
            );
            var.add_attribute(constants::NAME, name);
            ws.add(name, var).unwrap();
        }
        ws.setup().unwrap();
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        // Idempotent.
        ws.setup().unwrap();
        assert_eq!(setups.load(Ordering::SeqCst), 1);

        ws.teardown();
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);

        // A new setup runs the shared action again.
        ws.setup().unwrap();
        assert_eq!(setups.load(Ordering::SeqCst), 2);
        ws.teardown();
        assert_eq!(teardowns.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn type_registration_is_idempotent_for_equal_types() {
        let ws = Workspace::new();
        let ty = ValueType::Struct(Box::new(opseq_value::StructType {
            name: "pair".into(),
            fields: vec![("a".into(), ValueType::Int8)],
        }));
        assert!(ws.register_type("pair", ty.clone()));
        assert!(ws.register_type("pair", ty));
        assert!(!ws.register_type("pair", ValueType::Bool));
    }
}
