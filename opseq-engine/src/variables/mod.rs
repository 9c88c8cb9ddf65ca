//! Built-in variable kinds and the variable registry.

pub mod file;
pub mod local;

pub use file::{FILE_TYPE, file_variable};
pub use local::{LOCAL_TYPE, local_variable};

use crate::constants;
use crate::error::SetupError;
use crate::variable::{Variable, VariableSetupContext};
use indexmap::IndexMap;
use opseq_value::Value;

/// Parse the `type`/`value` attribute pair into an initial value.
///
/// No `type` attribute yields an empty value. A `type` without `value`
/// yields a zero-initialized value of that type. Parse failures are
/// variable setup errors carrying the offending attribute.
pub fn parse_initial_value(ctx: &VariableSetupContext<'_>) -> Result<Value, SetupError> {
    let Some(type_repr) = ctx.attrs.raw(constants::TYPE) else {
        return Ok(Value::Empty);
    };
    let ty = opseq_value::parse_type(type_repr, ctx.registry).map_err(|e| {
        SetupError::Variable(format!(
            "could not parse attribute [{}] with value [{}] to a type: {}",
            constants::TYPE,
            type_repr,
            e
        ))
    })?;
    match ctx.attrs.raw(constants::VALUE) {
        Some(value_repr) => opseq_value::parse_typed(&ty, value_repr).map_err(|e| {
            SetupError::Variable(format!(
                "could not parse attribute [{}] with value [{}] to a value: {}",
                constants::VALUE,
                value_repr,
                e
            ))
        }),
        None => Ok(Value::default_of(&ty)),
    }
}

/// Constructor for a variable of one type tag.
pub type VariableBuilder = Box<dyn Fn() -> Variable + Send + Sync>;

/// Type-tag keyed variable constructors, seeded with the built-in kinds.
pub struct VariableRegistry {
    builders: IndexMap<String, VariableBuilder>,
}

impl VariableRegistry {
    /// Registry with `Local` and `File` registered.
    pub fn new() -> Self {
        let mut registry = VariableRegistry {
            builders: IndexMap::new(),
        };
        registry.register(LOCAL_TYPE, Box::new(local_variable));
        registry.register(FILE_TYPE, Box::new(file_variable));
        registry
    }

    /// Register or replace a constructor for a type tag.
    pub fn register(&mut self, type_tag: &str, builder: VariableBuilder) {
        self.builders.insert(type_tag.to_string(), builder);
    }

    /// Create a variable by type tag.
    pub fn create(&self, type_tag: &str) -> Option<Variable> {
        self.builders.get(type_tag).map(|b| b())
    }

    /// Registered type tags in registration order.
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_kinds_are_registered() {
        let registry = VariableRegistry::new();
        assert!(registry.create(LOCAL_TYPE).is_some());
        assert!(registry.create(FILE_TYPE).is_some());
        assert!(registry.create("NoSuch").is_none());
    }
}
