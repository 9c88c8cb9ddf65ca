#![deny(missing_docs)]
//! Typed value model for the opseq sequencing engine.
//!
//! Everything an executing procedure touches flows through [`Value`]: workspace
//! variables, resolved instruction attributes, user input payloads. A value is
//! either empty, a scalar, a fixed-element-type array, or a named structure
//! with ordered fields. Once a value is non-empty its type is pinned; it only
//! changes through an explicit [`Value::replace`], which variables opt into
//! via dynamic typing.
//!
//! Assignment comes in three strengths:
//! - [`Value::assign`]: destination must be empty or of the exact same type.
//! - [`Value::convert_assign`]: additionally allows numeric conversions when
//!   the value fits. Bool/numeric and string conversions are refused.
//! - [`Value::replace`]: overwrites type and value unconditionally.
//!
//! Nested access uses dotted/indexed paths (`a.b[2].c`), see [`path`].

pub mod compare;
pub mod error;
pub mod json;
pub mod path;
pub mod registry;
pub mod types;
pub mod value;

pub use compare::{Compare, compare};
pub use error::ValueError;
pub use json::{from_json, from_json_typed, parse_type, parse_typed, to_json, type_from_json};
pub use path::{PathSegment, parse_path, split_leading_name};
pub use registry::TypeRegistry;
pub use types::{ArrayType, StructType, ValueType};
pub use value::{ArrayValue, FromValue, IntoValue, StructValue, Value};
