//! The [`Value`] enum and its assignment rules.

use crate::error::ValueError;
use crate::path::{PathSegment, parse_path};
use crate::types::{ArrayType, StructType, ValueType};
use indexmap::IndexMap;
use std::fmt;

/// A tagged value carried through workspaces, attributes and user input.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value yet. Accepts any type on first assignment.
    #[default]
    Empty,
    /// Boolean.
    Bool(bool),
    /// Single 8-bit character.
    Char8(u8),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    Str(String),
    /// Array with a fixed element type.
    Array(ArrayValue),
    /// Named structure with ordered fields.
    Struct(StructValue),
}

/// An array value; every element has the array's element type.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    element: ValueType,
    items: Vec<Value>,
}

/// A structure value with ordered named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl ArrayValue {
    /// Create an array, checking every item against the element type.
    pub fn new(element: ValueType, items: Vec<Value>) -> Result<Self, ValueError> {
        for item in &items {
            if !element.assignable_from(&item.value_type()) {
                return Err(ValueError::BadElement {
                    expected: element.to_string(),
                    found: item.value_type().to_string(),
                });
            }
        }
        Ok(ArrayValue { element, items })
    }

    /// The element type all items share.
    pub fn element_type(&self) -> &ValueType {
        &self.element
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Borrow the elements.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Append an element of the matching type.
    pub fn push(&mut self, item: Value) -> Result<(), ValueError> {
        if !self.element.assignable_from(&item.value_type()) {
            return Err(ValueError::BadElement {
                expected: self.element.to_string(),
                found: item.value_type().to_string(),
            });
        }
        self.items.push(item);
        Ok(())
    }

    fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.items.get_mut(index)
    }
}

impl StructValue {
    /// Create an empty structure value with the given type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        StructValue {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    /// The structure's type name; empty for anonymous structures.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Add a field at the end; duplicate names are refused.
    pub fn add_field(&mut self, name: impl Into<String>, value: Value) -> Result<(), ValueError> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(ValueError::MalformedPath(format!(
                "duplicate field name [{name}]"
            )));
        }
        self.fields.insert(name, value);
        Ok(())
    }

    /// Builder-style [`StructValue::add_field`]; panics on duplicates, so it
    /// is meant for literal construction in code and tests.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        assert!(
            !self.fields.contains_key(&name),
            "duplicate field name [{name}]"
        );
        self.fields.insert(name, value);
        self
    }

    /// Borrow a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Iterate fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Derive the structure's type.
    pub fn struct_type(&self) -> StructType {
        StructType {
            name: self.type_name.clone(),
            fields: self
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.value_type()))
                .collect(),
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }
}

impl Value {
    /// A zero-initialized value of the given type.
    pub fn default_of(ty: &ValueType) -> Value {
        match ty {
            ValueType::Empty => Value::Empty,
            ValueType::Bool => Value::Bool(false),
            ValueType::Char8 => Value::Char8(0),
            ValueType::Int8 => Value::Int8(0),
            ValueType::UInt8 => Value::UInt8(0),
            ValueType::Int16 => Value::Int16(0),
            ValueType::UInt16 => Value::UInt16(0),
            ValueType::Int32 => Value::Int32(0),
            ValueType::UInt32 => Value::UInt32(0),
            ValueType::Int64 => Value::Int64(0),
            ValueType::UInt64 => Value::UInt64(0),
            ValueType::Float32 => Value::Float32(0.0),
            ValueType::Float64 => Value::Float64(0.0),
            ValueType::String => Value::Str(String::new()),
            ValueType::Array(at) => {
                let items = (0..at.len).map(|_| Value::default_of(&at.element)).collect();
                Value::Array(ArrayValue {
                    element: at.element.clone(),
                    items,
                })
            }
            ValueType::Struct(st) => {
                let mut fields = IndexMap::new();
                for (name, field_ty) in &st.fields {
                    fields.insert(name.clone(), Value::default_of(field_ty));
                }
                Value::Struct(StructValue {
                    type_name: st.name.clone(),
                    fields,
                })
            }
        }
    }

    /// The value's type.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Empty => ValueType::Empty,
            Value::Bool(_) => ValueType::Bool,
            Value::Char8(_) => ValueType::Char8,
            Value::Int8(_) => ValueType::Int8,
            Value::UInt8(_) => ValueType::UInt8,
            Value::Int16(_) => ValueType::Int16,
            Value::UInt16(_) => ValueType::UInt16,
            Value::Int32(_) => ValueType::Int32,
            Value::UInt32(_) => ValueType::UInt32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Float32(_) => ValueType::Float32,
            Value::Float64(_) => ValueType::Float64,
            Value::Str(_) => ValueType::String,
            Value::Array(av) => ValueType::Array(Box::new(ArrayType {
                element: av.element.clone(),
                len: av.items.len(),
            })),
            Value::Struct(sv) => ValueType::Struct(Box::new(sv.struct_type())),
        }
    }

    /// True before the first assignment.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// True when a path resolves inside this value.
    pub fn has_field(&self, path: &str) -> bool {
        parse_path(path)
            .ok()
            .and_then(|segments| self.navigate(&segments))
            .is_some()
    }

    /// Copy out the sub-value a path points at. Fails without mutating.
    pub fn get_field(&self, path: &str) -> Result<Value, ValueError> {
        let segments = parse_path(path)?;
        self.navigate(&segments)
            .cloned()
            .ok_or_else(|| ValueError::NoSuchField(path.to_string()))
    }

    /// Assign into the sub-value a path points at, converting when the value
    /// fits. Fails when the path does not exist or the assignment is refused.
    pub fn set_field(&mut self, path: &str, value: &Value) -> Result<(), ValueError> {
        let segments = parse_path(path)?;
        let target = self
            .navigate_mut(&segments)
            .ok_or_else(|| ValueError::NoSuchField(path.to_string()))?;
        target.convert_assign(value)
    }

    fn navigate(&self, segments: &[PathSegment]) -> Option<&Value> {
        let mut current = self;
        for segment in segments {
            current = match (current, segment) {
                (Value::Struct(sv), PathSegment::Field(name)) => sv.field(name)?,
                (Value::Array(av), PathSegment::Index(index)) => av.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn navigate_mut(&mut self, segments: &[PathSegment]) -> Option<&mut Value> {
        let mut current = self;
        for segment in segments {
            current = match (current, segment) {
                (Value::Struct(sv), PathSegment::Field(name)) => sv.field_mut(name)?,
                (Value::Array(av), PathSegment::Index(index)) => av.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Strict assignment: the destination must be empty or share the source's
    /// type exactly (arrays: same element type).
    pub fn assign(&mut self, source: &Value) -> Result<(), ValueError> {
        if self.is_empty() || self.value_type().assignable_from(&source.value_type()) {
            *self = source.clone();
            return Ok(());
        }
        Err(ValueError::TypeMismatch {
            expected: self.value_type().to_string(),
            found: source.value_type().to_string(),
        })
    }

    /// Assignment with numeric conversion: like [`Value::assign`], but a
    /// numeric source may be converted into a numeric destination when the
    /// value fits. Arrays and structures of matching shape convert
    /// member-wise. Bool/numeric and string conversions are refused.
    pub fn convert_assign(&mut self, source: &Value) -> Result<(), ValueError> {
        if self.is_empty() || self.value_type().assignable_from(&source.value_type()) {
            *self = source.clone();
            return Ok(());
        }
        let mismatch = || ValueError::TypeMismatch {
            expected: self.value_type().to_string(),
            found: source.value_type().to_string(),
        };
        if self.value_type().is_numeric() && source.value_type().is_numeric() {
            let converted = convert_numeric(source, &self.value_type())?;
            *self = converted;
            return Ok(());
        }
        match (&*self, source) {
            (Value::Array(dst), Value::Array(src)) if dst.len() == src.len() => {
                let mut converted = dst.clone();
                for (slot, item) in converted.items.iter_mut().zip(src.items()) {
                    slot.convert_assign(item)?;
                }
                *self = Value::Array(converted);
                Ok(())
            }
            (Value::Struct(dst), Value::Struct(src)) => {
                let dst_names: Vec<&str> = dst.fields.keys().map(String::as_str).collect();
                let src_names: Vec<&str> = src.fields.keys().map(String::as_str).collect();
                if dst_names != src_names {
                    return Err(mismatch());
                }
                let mut converted = dst.clone();
                for (name, item) in src.fields() {
                    if let Some(slot) = converted.field_mut(name) {
                        slot.convert_assign(item)?;
                    }
                }
                *self = Value::Struct(converted);
                Ok(())
            }
            _ => Err(mismatch()),
        }
    }

    /// Dynamic assignment: overwrite type and value with a copy of the source.
    pub fn replace(&mut self, source: &Value) {
        *self = source.clone();
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            other => write!(f, "{}", crate::json::to_json(other)),
        }
    }
}

/// Convert a numeric value into the given numeric target type, refusing
/// conversions that would lose the value.
fn convert_numeric(source: &Value, target: &ValueType) -> Result<Value, ValueError> {
    let out_of_range = || ValueError::OutOfRange {
        value: source.to_string(),
        target: target.to_string(),
    };
    // Integer sources go through i128; float sources keep f64.
    #[derive(Clone, Copy)]
    enum Numeric {
        Int(i128),
        Float(f64),
    }
    let numeric = match *source {
        Value::Int8(v) => Numeric::Int(v as i128),
        Value::UInt8(v) => Numeric::Int(v as i128),
        Value::Int16(v) => Numeric::Int(v as i128),
        Value::UInt16(v) => Numeric::Int(v as i128),
        Value::Int32(v) => Numeric::Int(v as i128),
        Value::UInt32(v) => Numeric::Int(v as i128),
        Value::Int64(v) => Numeric::Int(v as i128),
        Value::UInt64(v) => Numeric::Int(v as i128),
        Value::Float32(v) => Numeric::Float(v as f64),
        Value::Float64(v) => Numeric::Float(v),
        _ => {
            return Err(ValueError::TypeMismatch {
                expected: target.to_string(),
                found: source.value_type().to_string(),
            });
        }
    };
    // Float to integer only when the value is already integral; the i128
    // cast saturates at the extremes and the per-target range check below
    // rejects anything that saturated.
    let integral: Result<i128, ValueError> = match numeric {
        Numeric::Int(i) => Ok(i),
        Numeric::Float(fl) if fl.is_finite() && fl.fract() == 0.0 => Ok(fl as i128),
        Numeric::Float(_) => Err(out_of_range()),
    };
    let value = match target {
        ValueType::Int8 => Value::Int8(i8::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::UInt8 => Value::UInt8(u8::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::Int16 => Value::Int16(i16::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::UInt16 => Value::UInt16(u16::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::Int32 => Value::Int32(i32::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::UInt32 => Value::UInt32(u32::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::Int64 => Value::Int64(i64::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::UInt64 => Value::UInt64(u64::try_from(integral?).map_err(|_| out_of_range())?),
        ValueType::Float32 => {
            let fl = match numeric {
                Numeric::Int(i) => {
                    // Exactly representable in an f32 mantissa.
                    if i.abs() > (1i128 << 24) {
                        return Err(out_of_range());
                    }
                    i as f64
                }
                Numeric::Float(fl) => fl,
            };
            let narrowed = fl as f32;
            if fl.is_finite() && !narrowed.is_finite() {
                return Err(out_of_range());
            }
            Value::Float32(narrowed)
        }
        ValueType::Float64 => {
            let fl = match numeric {
                Numeric::Int(i) => {
                    if i.abs() > (1i128 << 53) {
                        return Err(out_of_range());
                    }
                    i as f64
                }
                Numeric::Float(fl) => fl,
            };
            Value::Float64(fl)
        }
        _ => {
            return Err(ValueError::TypeMismatch {
                expected: target.to_string(),
                found: source.value_type().to_string(),
            });
        }
    };
    Ok(value)
}

/// Extraction of native values out of a [`Value`], with the same conversion
/// rules as [`Value::convert_assign`].
pub trait FromValue: Sized {
    /// Extract, converting when the value fits.
    fn from_value(value: &Value) -> Result<Self, ValueError>;
}

/// Conversion of native values into a [`Value`].
pub trait IntoValue {
    /// Wrap into the matching [`Value`] variant.
    fn into_value(self) -> Value;
}

macro_rules! numeric_from_value {
    ($native:ty, $variant:ident, $ty:expr) => {
        impl FromValue for $native {
            fn from_value(value: &Value) -> Result<Self, ValueError> {
                match convert_numeric(value, &$ty)? {
                    Value::$variant(v) => Ok(v),
                    _ => unreachable!("convert_numeric returned the wrong variant"),
                }
            }
        }

        impl IntoValue for $native {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

numeric_from_value!(i8, Int8, ValueType::Int8);
numeric_from_value!(u8, UInt8, ValueType::UInt8);
numeric_from_value!(i16, Int16, ValueType::Int16);
numeric_from_value!(u16, UInt16, ValueType::UInt16);
numeric_from_value!(i32, Int32, ValueType::Int32);
numeric_from_value!(u32, UInt32, ValueType::UInt32);
numeric_from_value!(i64, Int64, ValueType::Int64);
numeric_from_value!(u64, UInt64, ValueType::UInt64);
numeric_from_value!(f32, Float32, ValueType::Float32);
numeric_from_value!(f64, Float64, ValueType::Float64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(ValueError::TypeMismatch {
                expected: "bool".to_string(),
                found: other.value_type().to_string(),
            }),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(ValueError::TypeMismatch {
                expected: "string".to_string(),
                found: other.value_type().to_string(),
            }),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        Ok(value.clone())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}
