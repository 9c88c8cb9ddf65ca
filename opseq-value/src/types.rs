//! Type descriptions mirroring the shape of [`Value`](crate::Value).

use std::fmt;

/// The type of a [`Value`](crate::Value).
///
/// Array length participates in the description (it sizes default values) but
/// assignment compatibility between arrays is decided by element type alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// No type yet; the state of a fresh value.
    Empty,
    /// Boolean.
    Bool,
    /// Single 8-bit character.
    Char8,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Array of a single element type.
    Array(Box<ArrayType>),
    /// Named structure with ordered named fields.
    Struct(Box<StructType>),
}

/// Element type and default length of an array type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    /// Type of every element.
    pub element: ValueType,
    /// Number of elements a default-constructed value gets.
    pub len: usize,
}

/// A named structure type with ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    /// Registered name of the type; may be empty for anonymous structures.
    pub name: String,
    /// Ordered (field name, field type) pairs.
    pub fields: Vec<(String, ValueType)>,
}

impl ValueType {
    /// Look up a scalar type by its canonical name.
    pub fn scalar_from_name(name: &str) -> Option<ValueType> {
        let ty = match name {
            "empty" => ValueType::Empty,
            "bool" => ValueType::Bool,
            "char8" => ValueType::Char8,
            "int8" => ValueType::Int8,
            "uint8" => ValueType::UInt8,
            "int16" => ValueType::Int16,
            "uint16" => ValueType::UInt16,
            "int32" => ValueType::Int32,
            "uint32" => ValueType::UInt32,
            "int64" => ValueType::Int64,
            "uint64" => ValueType::UInt64,
            "float32" => ValueType::Float32,
            "float64" => ValueType::Float64,
            "string" => ValueType::String,
            _ => return None,
        };
        Some(ty)
    }

    /// True for integer and floating point types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Int8
                | ValueType::UInt8
                | ValueType::Int16
                | ValueType::UInt16
                | ValueType::Int32
                | ValueType::UInt32
                | ValueType::Int64
                | ValueType::UInt64
                | ValueType::Float32
                | ValueType::Float64
        )
    }

    /// True for everything that is not an array, structure or empty.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ValueType::Empty | ValueType::Array(_) | ValueType::Struct(_)
        )
    }

    /// Element type, when this is an array type.
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::Array(at) => Some(&at.element),
            _ => None,
        }
    }

    /// Whether two types are compatible for strict assignment.
    ///
    /// Identical types are compatible; arrays are compatible when their
    /// element types are, regardless of length.
    pub fn assignable_from(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Array(a), ValueType::Array(b)) => a.element.assignable_from(&b.element),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Empty => write!(f, "empty"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Char8 => write!(f, "char8"),
            ValueType::Int8 => write!(f, "int8"),
            ValueType::UInt8 => write!(f, "uint8"),
            ValueType::Int16 => write!(f, "int16"),
            ValueType::UInt16 => write!(f, "uint16"),
            ValueType::Int32 => write!(f, "int32"),
            ValueType::UInt32 => write!(f, "uint32"),
            ValueType::Int64 => write!(f, "int64"),
            ValueType::UInt64 => write!(f, "uint64"),
            ValueType::Float32 => write!(f, "float32"),
            ValueType::Float64 => write!(f, "float64"),
            ValueType::String => write!(f, "string"),
            ValueType::Array(at) => write!(f, "array<{}>", at.element),
            ValueType::Struct(st) if st.name.is_empty() => write!(f, "struct"),
            ValueType::Struct(st) => write!(f, "{}", st.name),
        }
    }
}

impl StructType {
    /// Type of the field with the given name, if present.
    pub fn field_type(&self, name: &str) -> Option<&ValueType> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| ty)
    }
}
