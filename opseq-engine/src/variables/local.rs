//! In-memory variable kind.

use crate::attr::Constraint;
use crate::constants;
use crate::error::SetupError;
use crate::variable::{SharedSetup, Variable, VariableKind, VariableSetupContext};
use opseq_value::{Value, ValueType};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Type tag of local variables.
pub const LOCAL_TYPE: &str = "Local";

/// Create a `Local` variable.
///
/// Attributes: optional `type` (JSON type description or registered name),
/// optional `value` (typed JSON literal, requires `type`), optional
/// `dynamicType` (boolean). Teardown clears the value; the configured
/// initial value comes back on the next setup.
pub fn local_variable() -> Variable {
    let var = Variable::new(LOCAL_TYPE, Box::new(LocalKind::default()));
    var.with_attrs(|attrs| {
        attrs.define(constants::TYPE, ValueType::String);
        attrs.define(constants::VALUE, ValueType::String);
        attrs.define(constants::IS_DYNAMIC_TYPE, ValueType::Bool);
        attrs.add_constraint(Constraint::or(
            Constraint::exists(constants::TYPE),
            Constraint::negate(Constraint::exists(constants::VALUE)),
        ));
    });
    var
}

#[derive(Default)]
struct LocalKind {
    value: Mutex<Value>,
    dynamic: AtomicBool,
}

impl VariableKind for LocalKind {
    fn setup(&self, ctx: &VariableSetupContext<'_>) -> Result<Option<SharedSetup>, SetupError> {
        let initial = super::parse_initial_value(ctx)?;
        self.dynamic.store(
            ctx.attrs
                .value_as::<bool>(constants::IS_DYNAMIC_TYPE)
                .unwrap_or(false),
            Ordering::SeqCst,
        );
        *self.value.lock() = initial;
        Ok(None)
    }

    fn teardown(&self) {
        *self.value.lock() = Value::Empty;
    }

    fn read(&self) -> Option<Value> {
        let value = self.value.lock();
        if value.is_empty() {
            return None;
        }
        Some(value.clone())
    }

    fn write(&self, value: &Value) -> Option<Value> {
        let mut stored = self.value.lock();
        if self.dynamic.load(Ordering::SeqCst) {
            stored.replace(value);
        } else if stored.convert_assign(value).is_err() {
            return None;
        }
        Some(stored.clone())
    }

    fn is_available(&self) -> bool {
        !self.value.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opseq_value::TypeRegistry;

    fn setup(var: &Variable) {
        var.setup(&TypeRegistry::new(), None).unwrap();
    }

    #[test]
    fn typed_initial_value() {
        let var = local_variable();
        var.add_attribute(constants::NAME, "counter");
        var.add_attribute(constants::TYPE, "uint32");
        var.add_attribute(constants::VALUE, "7");
        setup(&var);
        assert!(var.is_available());
        assert_eq!(var.get_value("").unwrap(), Value::UInt32(7));
    }

    #[test]
    fn type_without_value_is_zeroed() {
        let var = local_variable();
        var.add_attribute(constants::TYPE, "float64");
        setup(&var);
        assert_eq!(var.get_value("").unwrap(), Value::Float64(0.0));
    }

    #[test]
    fn value_without_type_fails_validation() {
        let var = local_variable();
        var.add_attribute(constants::VALUE, "7");
        assert!(var.setup(&TypeRegistry::new(), None).is_err());
    }

    #[test]
    fn untyped_variable_takes_first_assignment() {
        let var = local_variable();
        setup(&var);
        assert!(!var.is_available());
        assert!(var.set_value("", &Value::Int16(-2)));
        assert_eq!(var.get_value("").unwrap(), Value::Int16(-2));
        // Type is pinned now.
        assert!(!var.set_value("", &Value::Str("no".into())));
    }

    #[test]
    fn dynamic_variable_accepts_type_changes() {
        let var = local_variable();
        var.add_attribute(constants::TYPE, "uint32");
        var.add_attribute(constants::VALUE, "0");
        var.add_attribute(constants::IS_DYNAMIC_TYPE, "true");
        setup(&var);
        assert!(var.set_value("", &Value::Str("now a string".into())));
        assert_eq!(
            var.get_value("").unwrap(),
            Value::Str("now a string".into())
        );
    }

    #[test]
    fn teardown_clears_then_setup_restores() {
        let var = local_variable();
        var.add_attribute(constants::TYPE, "uint32");
        var.add_attribute(constants::VALUE, "3");
        setup(&var);
        assert!(var.set_value("", &Value::UInt32(9)));
        var.teardown();
        assert!(!var.is_available());
        assert!(var.get_value("").is_none());
        setup(&var);
        assert_eq!(var.get_value("").unwrap(), Value::UInt32(3));
    }

    #[test]
    fn unparsable_initial_value_is_a_setup_error() {
        let var = local_variable();
        var.add_attribute(constants::TYPE, "uint32");
        var.add_attribute(constants::VALUE, "\"text\"");
        assert!(var.setup(&TypeRegistry::new(), None).is_err());
    }
}
