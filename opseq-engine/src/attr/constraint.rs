//! Attribute constraints.
//!
//! A constraint is a predicate over the supplied string attributes of an
//! instruction or variable. Validation collects the representations of every
//! failed constraint instead of stopping at the first.

use super::parse::parse_attribute_string;
use opseq_value::ValueType;

/// A predicate over an attribute list.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// The named attribute is present.
    Exists(String),
    /// The named attribute parses as the given type (absence passes).
    FixedType(String, ValueType),
    /// Both operands hold.
    And(Box<Constraint>, Box<Constraint>),
    /// At least one operand holds.
    Or(Box<Constraint>, Box<Constraint>),
    /// Exactly one operand holds.
    Xor(Box<Constraint>, Box<Constraint>),
    /// The operand does not hold.
    Not(Box<Constraint>),
}

impl Constraint {
    /// Shorthand for [`Constraint::Exists`].
    pub fn exists(name: impl Into<String>) -> Constraint {
        Constraint::Exists(name.into())
    }

    /// Shorthand for [`Constraint::FixedType`].
    pub fn fixed_type(name: impl Into<String>, ty: ValueType) -> Constraint {
        Constraint::FixedType(name.into(), ty)
    }

    /// Shorthand for [`Constraint::And`].
    pub fn and(left: Constraint, right: Constraint) -> Constraint {
        Constraint::And(Box::new(left), Box::new(right))
    }

    /// Shorthand for [`Constraint::Or`].
    pub fn or(left: Constraint, right: Constraint) -> Constraint {
        Constraint::Or(Box::new(left), Box::new(right))
    }

    /// Shorthand for [`Constraint::Xor`].
    pub fn xor(left: Constraint, right: Constraint) -> Constraint {
        Constraint::Xor(Box::new(left), Box::new(right))
    }

    /// Shorthand for [`Constraint::Not`].
    pub fn negate(inner: Constraint) -> Constraint {
        Constraint::Not(Box::new(inner))
    }

    /// Evaluate against a supplied attribute list.
    pub fn validate(&self, attributes: &[(String, String)]) -> bool {
        match self {
            Constraint::Exists(name) => attributes.iter().any(|(n, _)| n == name),
            Constraint::FixedType(name, ty) => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| parse_attribute_string(ty, v).is_ok())
                .unwrap_or(true),
            Constraint::And(a, b) => a.validate(attributes) && b.validate(attributes),
            Constraint::Or(a, b) => a.validate(attributes) || b.validate(attributes),
            Constraint::Xor(a, b) => a.validate(attributes) != b.validate(attributes),
            Constraint::Not(inner) => !inner.validate(attributes),
        }
    }

    /// Human-readable representation used in validation failure lists.
    pub fn representation(&self) -> String {
        match self {
            Constraint::Exists(name) => format!("Exists({name})"),
            Constraint::FixedType(name, ty) => format!("FixedType({name}, {ty})"),
            Constraint::And(a, b) => {
                format!("And({}, {})", a.representation(), b.representation())
            }
            Constraint::Or(a, b) => format!("Or({}, {})", a.representation(), b.representation()),
            Constraint::Xor(a, b) => {
                format!("Xor({}, {})", a.representation(), b.representation())
            }
            Constraint::Not(inner) => format!("Not({})", inner.representation()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Vec<(String, String)> {
        vec![
            ("empty_string".to_string(), String::new()),
            ("double".to_string(), "4.5".to_string()),
        ]
    }

    #[test]
    fn exists_checks_presence() {
        assert!(Constraint::exists("empty_string").validate(&attrs()));
        assert!(!Constraint::exists("does_not_exist").validate(&attrs()));
        assert_eq!(
            Constraint::exists("x").representation(),
            "Exists(x)".to_string()
        );
    }

    #[test]
    fn fixed_type_checks_parseability() {
        assert!(Constraint::fixed_type("double", ValueType::Float64).validate(&attrs()));
        assert!(!Constraint::fixed_type("double", ValueType::UInt8).validate(&attrs()));
        // Absent attributes pass; mandatoriness is a separate concern.
        assert!(Constraint::fixed_type("absent", ValueType::UInt8).validate(&attrs()));
    }

    #[test]
    fn boolean_combinators() {
        let present = || Constraint::exists("double");
        let absent = || Constraint::exists("nope");
        assert!(Constraint::and(present(), present()).validate(&attrs()));
        assert!(!Constraint::and(present(), absent()).validate(&attrs()));
        assert!(Constraint::or(absent(), present()).validate(&attrs()));
        assert!(Constraint::xor(absent(), present()).validate(&attrs()));
        assert!(!Constraint::xor(present(), present()).validate(&attrs()));
        assert!(Constraint::negate(absent()).validate(&attrs()));
        assert_eq!(
            Constraint::or(absent(), present()).representation(),
            "Or(Exists(nope), Exists(double))"
        );
    }
}
