//! JSON emission and strict typed parsing.
//!
//! Attribute literals and type registrations travel as JSON. Parsing is
//! strict: partial parses, lossy numbers and shape mismatches are rejected.
//!
//! Type descriptions are either a type name (`"uint32"`, or the name of a
//! registered structure type), an array description
//! `{"element": <type>, "size": 4}` (size is optional and only affects
//! default construction), or a structure description
//! `{"name": "point2d", "fields": [["x", "int32"], ["y", "int32"]]}`.

use crate::error::ValueError;
use crate::registry::TypeRegistry;
use crate::types::{ArrayType, StructType, ValueType};
use crate::value::{ArrayValue, StructValue, Value};
use serde_json::Value as Json;

/// Emit a value as a JSON document. Structure fields keep declaration order;
/// non-finite floats emit as `null`.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Empty => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::Char8(v) => Json::from(*v),
        Value::Int8(v) => Json::from(*v),
        Value::UInt8(v) => Json::from(*v),
        Value::Int16(v) => Json::from(*v),
        Value::UInt16(v) => Json::from(*v),
        Value::Int32(v) => Json::from(*v),
        Value::UInt32(v) => Json::from(*v),
        Value::Int64(v) => Json::from(*v),
        Value::UInt64(v) => Json::from(*v),
        Value::Float32(v) => serde_json::Number::from_f64(*v as f64)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Float64(v) => serde_json::Number::from_f64(*v)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Str(v) => Json::String(v.clone()),
        Value::Array(av) => Json::Array(av.items().iter().map(to_json).collect()),
        Value::Struct(sv) => {
            let mut map = serde_json::Map::new();
            for (name, field) in sv.fields() {
                map.insert(name.to_string(), to_json(field));
            }
            Json::Object(map)
        }
    }
}

/// Parse a JSON string representation into a value of the given type.
pub fn parse_typed(ty: &ValueType, repr: &str) -> Result<Value, ValueError> {
    let json: Json = serde_json::from_str(repr).map_err(|e| ValueError::ParseFailure {
        input: repr.to_string(),
        target: ty.to_string(),
        reason: e.to_string(),
    })?;
    from_json_typed(ty, &json)
}

/// Convert parsed JSON into a value of the given type, strictly.
pub fn from_json_typed(ty: &ValueType, json: &Json) -> Result<Value, ValueError> {
    let fail = |reason: &str| ValueError::ParseFailure {
        input: json.to_string(),
        target: ty.to_string(),
        reason: reason.to_string(),
    };
    let int = |min: i128, max: i128| -> Result<i128, ValueError> {
        let v = match json {
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i as i128
                } else if let Some(u) = n.as_u64() {
                    u as i128
                } else {
                    return Err(fail("not an integer"));
                }
            }
            _ => return Err(fail("not an integer")),
        };
        if v < min || v > max {
            return Err(fail("out of range"));
        }
        Ok(v)
    };
    let value = match ty {
        ValueType::Empty => match json {
            Json::Null => Value::Empty,
            _ => return Err(fail("expected null")),
        },
        ValueType::Bool => match json {
            Json::Bool(b) => Value::Bool(*b),
            _ => return Err(fail("expected a boolean")),
        },
        ValueType::Char8 => Value::Char8(int(0, u8::MAX as i128)? as u8),
        ValueType::Int8 => Value::Int8(int(i8::MIN as i128, i8::MAX as i128)? as i8),
        ValueType::UInt8 => Value::UInt8(int(0, u8::MAX as i128)? as u8),
        ValueType::Int16 => Value::Int16(int(i16::MIN as i128, i16::MAX as i128)? as i16),
        ValueType::UInt16 => Value::UInt16(int(0, u16::MAX as i128)? as u16),
        ValueType::Int32 => Value::Int32(int(i32::MIN as i128, i32::MAX as i128)? as i32),
        ValueType::UInt32 => Value::UInt32(int(0, u32::MAX as i128)? as u32),
        ValueType::Int64 => Value::Int64(int(i64::MIN as i128, i64::MAX as i128)? as i64),
        ValueType::UInt64 => match json {
            Json::Number(n) => match n.as_u64() {
                Some(u) => Value::UInt64(u),
                None => return Err(fail("not an unsigned integer")),
            },
            _ => return Err(fail("not an integer")),
        },
        ValueType::Float32 => match json.as_f64() {
            Some(f) => Value::Float32(f as f32),
            None => return Err(fail("not a number")),
        },
        ValueType::Float64 => match json.as_f64() {
            Some(f) => Value::Float64(f),
            None => return Err(fail("not a number")),
        },
        ValueType::String => match json {
            Json::String(s) => Value::Str(s.clone()),
            _ => return Err(fail("expected a string")),
        },
        ValueType::Array(at) => match json {
            Json::Array(items) => {
                let mut parsed = Vec::with_capacity(items.len());
                for item in items {
                    parsed.push(from_json_typed(&at.element, item)?);
                }
                Value::Array(ArrayValue::new(at.element.clone(), parsed)?)
            }
            _ => return Err(fail("expected an array")),
        },
        ValueType::Struct(st) => match json {
            Json::Object(map) => {
                if map.len() != st.fields.len() {
                    return Err(fail("field count mismatch"));
                }
                let mut sv = StructValue::new(st.name.clone());
                for (name, field_ty) in &st.fields {
                    let field_json = map
                        .get(name)
                        .ok_or_else(|| fail(&format!("missing field [{name}]")))?;
                    sv.add_field(name.clone(), from_json_typed(field_ty, field_json)?)?;
                }
                Value::Struct(sv)
            }
            _ => return Err(fail("expected an object")),
        },
    };
    Ok(value)
}

/// Convert parsed JSON into a value with inferred types: integers become
/// int64/uint64, numbers float64, objects anonymous structures. Arrays must
/// be homogeneous.
pub fn from_json(json: &Json) -> Result<Value, ValueError> {
    let value = match json {
        Json::Null => Value::Empty,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::UInt64(u)
            } else if let Some(i) = n.as_i64() {
                Value::Int64(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float64(f)
            } else {
                return Err(ValueError::ParseFailure {
                    input: json.to_string(),
                    target: "number".to_string(),
                    reason: "unrepresentable number".to_string(),
                });
            }
        }
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => {
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                parsed.push(from_json(item)?);
            }
            let element = parsed
                .first()
                .map(Value::value_type)
                .unwrap_or(ValueType::Empty);
            Value::Array(ArrayValue::new(element, parsed)?)
        }
        Json::Object(map) => {
            let mut sv = StructValue::new("");
            for (name, field) in map {
                sv.add_field(name.clone(), from_json(field)?)?;
            }
            Value::Struct(sv)
        }
    };
    Ok(value)
}

/// Parse a type description string against a registry.
///
/// Bare scalar names and registered names are accepted without JSON quoting;
/// anything else must be a JSON type description.
pub fn parse_type(repr: &str, registry: &TypeRegistry) -> Result<ValueType, ValueError> {
    if let Some(ty) = ValueType::scalar_from_name(repr) {
        return Ok(ty);
    }
    if let Some(ty) = registry.get(repr) {
        return Ok(ty.clone());
    }
    let json: Json = serde_json::from_str(repr).map_err(|_| {
        ValueError::UnknownType(repr.to_string())
    })?;
    type_from_json(&json, registry)
}

/// Parse a JSON type description against a registry.
pub fn type_from_json(json: &Json, registry: &TypeRegistry) -> Result<ValueType, ValueError> {
    match json {
        Json::String(name) => ValueType::scalar_from_name(name)
            .or_else(|| registry.get(name).cloned())
            .ok_or_else(|| ValueError::UnknownType(name.clone())),
        Json::Object(map) => {
            if let Some(element) = map.get("element") {
                let element = type_from_json(element, registry)?;
                let len = map.get("size").and_then(Json::as_u64).unwrap_or(0) as usize;
                return Ok(ValueType::Array(Box::new(ArrayType { element, len })));
            }
            if let Some(fields) = map.get("fields") {
                let name = map
                    .get("name")
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string();
                let fields = parse_struct_fields(fields, registry)?;
                return Ok(ValueType::Struct(Box::new(StructType { name, fields })));
            }
            Err(ValueError::UnknownType(json.to_string()))
        }
        _ => Err(ValueError::UnknownType(json.to_string())),
    }
}

fn parse_struct_fields(
    json: &Json,
    registry: &TypeRegistry,
) -> Result<Vec<(String, ValueType)>, ValueError> {
    let items = json
        .as_array()
        .ok_or_else(|| ValueError::UnknownType(json.to_string()))?;
    let mut fields = Vec::with_capacity(items.len());
    for item in items {
        let pair = item
            .as_array()
            .filter(|pair| pair.len() == 2)
            .ok_or_else(|| ValueError::UnknownType(item.to_string()))?;
        let name = pair[0]
            .as_str()
            .ok_or_else(|| ValueError::UnknownType(item.to_string()))?;
        if fields.iter().any(|(existing, _)| existing == name) {
            return Err(ValueError::UnknownType(format!(
                "duplicate field name [{name}]"
            )));
        }
        fields.push((name.to_string(), type_from_json(&pair[1], registry)?));
    }
    Ok(fields)
}
