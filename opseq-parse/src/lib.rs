#![deny(missing_docs)]
//! JSON procedure documents for the opseq engine.
//!
//! A procedure document is one JSON object:
//!
//! ```json
//! {
//!   "procedure": {"name": "demo", "tickTimeout": 0.05},
//!   "registerTypes": [{"jsontype": {"name": "point2d", "fields": [["x", "int32"], ["y", "int32"]]}}],
//!   "plugins": [],
//!   "workspace": [
//!     {"type": "Local", "attributes": {"name": "a", "type": "uint32", "value": 1}}
//!   ],
//!   "instructions": [
//!     {"type": "Sequence", "children": [
//!       {"type": "Wait", "attributes": {"timeout": 0}}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Attribute values may be JSON strings, numbers or booleans; they all land
//! as the engine's string attributes. The parser doubles as the
//! [`ProcedureLoader`] behind `Include` instructions.

mod error;
mod parser;

pub use error::ParseError;
pub use parser::ProcedureParser;
