//! String representation parsing for attribute values.

use opseq_value::{Value, ValueError, ValueType};

const TRUE_REPRESENTATIONS: [&str; 3] = ["true", "yes", "on"];

/// Parse an attribute string into a value of the given type.
///
/// Booleans accept `true`/`yes`/`on` (case-insensitive) as true and anything
/// else as false; strings pass through unchanged; every other type goes
/// through strict typed JSON parsing.
pub fn parse_attribute_string(ty: &ValueType, repr: &str) -> Result<Value, ValueError> {
    match ty {
        ValueType::Bool => Ok(Value::Bool(is_true_representation(repr))),
        ValueType::String => Ok(Value::Str(repr.to_string())),
        _ => opseq_value::parse_typed(ty, repr),
    }
}

fn is_true_representation(repr: &str) -> bool {
    TRUE_REPRESENTATIONS
        .iter()
        .any(|t| repr.eq_ignore_ascii_case(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_representations() {
        for repr in ["true", "Yes", "ON"] {
            assert_eq!(
                parse_attribute_string(&ValueType::Bool, repr).unwrap(),
                Value::Bool(true)
            );
        }
        for repr in ["false", "off", "1", "whatever"] {
            assert_eq!(
                parse_attribute_string(&ValueType::Bool, repr).unwrap(),
                Value::Bool(false)
            );
        }
    }

    #[test]
    fn strings_pass_through() {
        assert_eq!(
            parse_attribute_string(&ValueType::String, "not \"json\"").unwrap(),
            Value::Str("not \"json\"".to_string())
        );
    }

    #[test]
    fn scalars_parse_strictly() {
        assert_eq!(
            parse_attribute_string(&ValueType::UInt16, "512").unwrap(),
            Value::UInt16(512)
        );
        assert!(parse_attribute_string(&ValueType::UInt16, "70000").is_err());
        assert!(parse_attribute_string(&ValueType::UInt16, "5 apples").is_err());
        assert_eq!(
            parse_attribute_string(&ValueType::Float64, "2.5").unwrap(),
            Value::Float64(2.5)
        );
    }
}
