//! Registry for user-defined named types.

use crate::types::{StructType, ValueType};
use indexmap::IndexMap;

/// Named user-defined types, usually populated from a procedure's preamble.
///
/// Registration is idempotent for structurally equal types and refused for a
/// conflicting redefinition of the same name. The registry is read-only after
/// procedure setup.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, ValueType>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under a name.
    ///
    /// Returns true when the name was free or already bound to a structurally
    /// equal type, false on a conflicting redefinition or an empty name.
    pub fn register(&mut self, name: &str, ty: ValueType) -> bool {
        if name.is_empty() {
            return false;
        }
        match self.types.get(name) {
            Some(existing) => *existing == ty,
            None => {
                self.types.insert(name.to_string(), ty);
                true
            }
        }
    }

    /// Register a structure type under its own name.
    pub fn register_struct(&mut self, st: StructType) -> bool {
        let name = st.name.clone();
        self.register(&name, ValueType::Struct(Box::new(st)))
    }

    /// Look up a type by name.
    pub fn get(&self, name: &str) -> Option<&ValueType> {
        self.types.get(name)
    }

    /// True when a type with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Iterate registered (name, type) pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueType)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }
}
