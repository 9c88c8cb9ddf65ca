//! String-keyed attributes with schema validation.
//!
//! Instructions, variables and procedures all carry `(name, string)`
//! attributes. An [`AttributeHandler`] pairs the supplied attributes with a
//! schema: ordered [`AttributeDefinition`]s plus custom [`Constraint`]s.
//! Validation never fails hard; it returns the list of failed constraint
//! representations, empty on success.

pub mod constraint;
pub mod parse;

pub use constraint::Constraint;
pub use parse::parse_attribute_string;

use crate::constants::VARIABLE_SIGIL;
use opseq_value::{FromValue, Value, ValueError, ValueType};

/// How an attribute string is interpreted at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeCategory {
    /// The string is the value.
    #[default]
    Literal,
    /// The string names a workspace variable whose current value is the
    /// effective value.
    VariableName,
    /// Variable name when prefixed with `@`, literal otherwise.
    Both,
}

/// Schema entry for one attribute: value type, mandatory flag and category.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    name: String,
    value_type: ValueType,
    mandatory: bool,
    category: AttributeCategory,
}

impl AttributeDefinition {
    /// The attribute name this definition covers.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type attribute strings parse into.
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Whether the attribute must be supplied.
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// The resolution category.
    pub fn category(&self) -> AttributeCategory {
        self.category
    }

    /// Mark the attribute as mandatory.
    pub fn mandatory(&mut self) -> &mut Self {
        self.mandatory = true;
        self
    }

    /// Set the resolution category.
    pub fn category_mut(&mut self, category: AttributeCategory) -> &mut Self {
        self.category = category;
        self
    }
}

/// Resolution info for one supplied attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValueInfo {
    /// True when the effective string names a workspace variable.
    pub is_variable: bool,
    /// The effective string, with a leading `@` already stripped.
    pub text: String,
}

/// Ordered attribute definitions, constraints and supplied attributes.
#[derive(Debug, Default, Clone)]
pub struct AttributeHandler {
    definitions: Vec<AttributeDefinition>,
    constraints: Vec<Constraint>,
    attributes: Vec<(String, String)>,
    failed: Vec<String>,
}

impl AttributeHandler {
    /// Create an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define an attribute. Chaining configures it:
    /// `handler.define("timeout", ValueType::Float64).mandatory()`.
    ///
    /// Defining the same name twice is programmer error and panics.
    pub fn define(&mut self, name: &str, value_type: ValueType) -> &mut AttributeDefinition {
        assert!(
            self.definition(name).is_none(),
            "attribute [{name}] is already defined"
        );
        self.definitions.push(AttributeDefinition {
            name: name.to_string(),
            value_type,
            mandatory: false,
            category: AttributeCategory::Literal,
        });
        self.definitions
            .last_mut()
            .expect("definition was just pushed")
    }

    /// Append a custom constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Look up a definition by name.
    pub fn definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.iter().find(|def| def.name == name)
    }

    /// All definitions in declaration order.
    pub fn definitions(&self) -> &[AttributeDefinition] {
        &self.definitions
    }

    /// Supply an attribute. Returns false when the name is already present.
    pub fn add_string(&mut self, name: &str, value: &str) -> bool {
        if self.has(name) {
            return false;
        }
        self.attributes.push((name.to_string(), value.to_string()));
        true
    }

    /// Supply or overwrite an attribute.
    pub fn set_string(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// True when the attribute was supplied.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n == name)
    }

    /// The raw supplied string for an attribute.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All supplied attributes in insertion order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Validate supplied attributes against the schema.
    ///
    /// Synthesized constraints come first: every mandatory definition must be
    /// present, and every supplied attribute with a definition must parse as
    /// its type (attributes referring to variables are resolved at tick time
    /// and skipped here). Custom constraints are appended. Returns true when
    /// nothing failed; the failure list is kept for
    /// [`AttributeHandler::failed_constraints`].
    pub fn validate(&mut self) -> bool {
        let mut failed = Vec::new();
        for def in &self.definitions {
            if def.mandatory && !self.has(&def.name) {
                failed.push(Constraint::exists(&def.name).representation());
            }
        }
        for (name, value) in &self.attributes {
            let Some(def) = self.definitions.iter().find(|d| &d.name == name) else {
                // Undefined attributes parse as strings and always pass.
                continue;
            };
            if refers_to_variable(def, value) {
                continue;
            }
            if parse_attribute_string(&def.value_type, value).is_err() {
                failed.push(
                    Constraint::fixed_type(&def.name, def.value_type.clone()).representation(),
                );
            }
        }
        for constraint in &self.constraints {
            if !constraint.validate(&self.attributes) {
                failed.push(constraint.representation());
            }
        }
        self.failed = failed;
        self.failed.is_empty()
    }

    /// Representations of the constraints the last validation failed.
    pub fn failed_constraints(&self) -> &[String] {
        &self.failed
    }

    /// Forget the last validation outcome.
    pub fn clear_failed_constraints(&mut self) {
        self.failed.clear();
    }

    /// Parse the supplied attribute string against its defined type.
    ///
    /// Undefined attributes parse as strings. Variable-category attributes
    /// are not resolved here; the instruction resolves them at tick time
    /// against the workspace.
    pub fn value(&self, name: &str) -> Result<Value, ValueError> {
        let raw = self
            .raw(name)
            .ok_or_else(|| ValueError::NoSuchField(name.to_string()))?;
        let ty = self
            .definition(name)
            .map(|def| def.value_type.clone())
            .unwrap_or(ValueType::String);
        parse_attribute_string(&ty, raw)
    }

    /// [`AttributeHandler::value`] converted into a native type.
    pub fn value_as<T: FromValue>(&self, name: &str) -> Result<T, ValueError> {
        T::from_value(&self.value(name)?)
    }

    /// Replace attribute values of the form `$key` with entries from the
    /// source map. Placeholders without a source entry are left untouched
    /// and make the call return false.
    pub fn substitute_placeholders(&mut self, source: &[(String, String)]) -> bool {
        let mut all_resolved = true;
        for (_, value) in &mut self.attributes {
            let Some(key) = value.strip_prefix(crate::constants::PLACEHOLDER_SIGIL) else {
                continue;
            };
            match source.iter().find(|(name, _)| name == key) {
                Some((_, replacement)) => *value = replacement.clone(),
                None => all_resolved = false,
            }
        }
        all_resolved
    }

    /// Resolution info for a supplied attribute: whether it names a variable,
    /// and the effective string with the `@` prefix stripped.
    pub fn value_info(&self, name: &str) -> Option<AttributeValueInfo> {
        let raw = self.raw(name)?;
        let category = self
            .definition(name)
            .map(|def| def.category)
            .unwrap_or_default();
        let info = match category {
            AttributeCategory::VariableName => AttributeValueInfo {
                is_variable: true,
                text: raw.to_string(),
            },
            AttributeCategory::Both if raw.starts_with(VARIABLE_SIGIL) => AttributeValueInfo {
                is_variable: true,
                text: raw[VARIABLE_SIGIL.len_utf8()..].to_string(),
            },
            _ => AttributeValueInfo {
                is_variable: false,
                text: raw.to_string(),
            },
        };
        Some(info)
    }
}

fn refers_to_variable(def: &AttributeDefinition, value: &str) -> bool {
    match def.category {
        AttributeCategory::VariableName => true,
        AttributeCategory::Both => value.starts_with(VARIABLE_SIGIL),
        AttributeCategory::Literal => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> AttributeHandler {
        let mut h = AttributeHandler::new();
        h.define("timeout", ValueType::Float64);
        h.define("target", ValueType::UInt32)
            .category_mut(AttributeCategory::Both);
        h.define("outputVar", ValueType::String)
            .category_mut(AttributeCategory::VariableName)
            .mandatory();
        h
    }

    #[test]
    fn duplicate_attribute_fails() {
        let mut h = handler();
        assert!(h.add_string("timeout", "2.0"));
        assert!(!h.add_string("timeout", "3.0"));
        assert_eq!(h.raw("timeout"), Some("2.0"));
    }

    #[test]
    fn validation_synthesizes_mandatory_and_type_constraints() {
        let mut h = handler();
        h.add_string("timeout", "not a number");
        assert!(!h.validate());
        let failed = h.failed_constraints().to_vec();
        assert!(failed.contains(&"Exists(outputVar)".to_string()));
        assert!(failed.contains(&"FixedType(timeout, float64)".to_string()));

        h.set_string("timeout", "1.5");
        h.add_string("outputVar", "result");
        assert!(h.validate());
        assert!(h.failed_constraints().is_empty());
    }

    #[test]
    fn variable_references_skip_type_validation() {
        let mut h = handler();
        h.add_string("outputVar", "some_var");
        // Not parseable as uint32, but it names a variable.
        h.add_string("target", "@some_var");
        assert!(h.validate());
    }

    #[test]
    fn custom_constraints_are_appended() {
        let mut h = handler();
        h.add_string("outputVar", "x");
        h.add_constraint(Constraint::negate(Constraint::exists("forbidden")));
        assert!(h.validate());
        h.add_string("forbidden", "1");
        assert!(!h.validate());
        assert_eq!(
            h.failed_constraints(),
            ["Not(Exists(forbidden))".to_string()]
        );
    }

    #[test]
    fn value_parses_against_definitions() {
        let mut h = handler();
        h.add_string("timeout", "2.5");
        h.add_string("outputVar", "x");
        h.add_string("undefined", "free text");
        assert_eq!(h.value("timeout").unwrap(), Value::Float64(2.5));
        assert_eq!(h.value_as::<f64>("timeout").unwrap(), 2.5);
        assert_eq!(
            h.value("undefined").unwrap(),
            Value::Str("free text".to_string())
        );
        assert!(h.value("missing").is_err());
    }

    #[test]
    fn value_info_strips_variable_sigil() {
        let mut h = handler();
        h.add_string("target", "@position.x");
        h.add_string("outputVar", "result");
        h.add_string("timeout", "1.0");
        let info = h.value_info("target").unwrap();
        assert!(info.is_variable);
        assert_eq!(info.text, "position.x");
        let info = h.value_info("outputVar").unwrap();
        assert!(info.is_variable);
        assert_eq!(info.text, "result");
        let info = h.value_info("timeout").unwrap();
        assert!(!info.is_variable);
        assert_eq!(info.text, "1.0");
    }
}
