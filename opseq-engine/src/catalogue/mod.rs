//! The built-in instruction catalogue.
//!
//! Construction is type-safe (`inverter(child)` takes exactly one child);
//! the [`InstructionRegistry`] wraps the same builders behind type tags for
//! parsers, with child-count checking at the registry boundary.

mod compare;
mod output;
mod user_io;
mod wait;
mod workspace_ops;

pub use compare::{equals, greater_than_or_equal};
pub use output::{log_message, message, output_value};
pub use user_io::{user_choice, user_confirmation, user_input};
pub use wait::wait;
pub use workspace_ops::{add_element, copy};

use crate::attr::AttributeCategory;
use crate::constants;
use crate::error::InvalidOperationError;
use crate::instruction::parallel::ParallelState;
use crate::instruction::{Behavior, Instruction, RepeatState};
use crate::procedure::IncludeState;
use indexmap::IndexMap;
use opseq_value::ValueType;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;

fn into_arcs(children: Vec<Instruction>) -> Vec<Arc<Instruction>> {
    children.into_iter().map(Arc::new).collect()
}

/// Ordered AND over its children.
pub fn sequence(children: Vec<Instruction>) -> Instruction {
    Instruction::with_behavior("Sequence", Behavior::Sequence(into_arcs(children)))
}

/// Ordered OR over its children.
pub fn fallback(children: Vec<Instruction>) -> Instruction {
    Instruction::with_behavior("Fallback", Behavior::Fallback(into_arcs(children)))
}

/// Concurrent compound with success/failure thresholds
/// (`successThreshold`, `failureThreshold`).
pub fn parallel_sequence(children: Vec<Instruction>) -> Instruction {
    let instr = Instruction::with_behavior(
        "ParallelSequence",
        Behavior::Parallel(ParallelState::new(into_arcs(children))),
    );
    instr.with_attrs(|attrs| {
        attrs.define(constants::SUCCESS_THRESHOLD, ValueType::UInt32);
        attrs.define(constants::FAILURE_THRESHOLD, ValueType::UInt32);
    });
    instr
}

/// Decorator mapping the child's SUCCESS to FAILURE and vice versa.
pub fn inverter(child: Instruction) -> Instruction {
    Instruction::with_behavior("Inverter", Behavior::Inverter(Arc::new(child)))
}

/// Decorator surfacing SUCCESS whenever the child completes.
pub fn force_success(child: Instruction) -> Instruction {
    Instruction::with_behavior("ForceSuccess", Behavior::ForceSuccess(Arc::new(child)))
}

/// Decorator re-running its child until `maxCount` successes (unbounded
/// when absent); failure propagates immediately.
pub fn repeat(child: Instruction) -> Instruction {
    let instr = Instruction::with_behavior(
        "Repeat",
        Behavior::Repeat(RepeatState {
            child: Arc::new(child),
            max_count: Mutex::new(None),
            count: AtomicU32::new(0),
        }),
    );
    instr.with_attrs(|attrs| {
        attrs.define(constants::MAX_COUNT, ValueType::UInt32);
    });
    instr
}

/// Executes another procedure (`file` attribute) against that procedure's
/// own workspace. Extra attributes feed `$key` placeholders.
pub fn include() -> Instruction {
    let instr = Instruction::with_behavior("Include", Behavior::Include(IncludeState::new()));
    instr.with_attrs(|attrs| {
        attrs.define(constants::FILE, ValueType::String).mandatory();
    });
    instr
}

pub(crate) fn define_variable_attr(instr: &Instruction, name: &str, mandatory: bool) {
    instr.with_attrs(|attrs| {
        let def = attrs.define(name, ValueType::String);
        def.category_mut(AttributeCategory::VariableName);
        if mandatory {
            def.mandatory();
        }
    });
}

pub(crate) fn define_both_attr(instr: &Instruction, name: &str, mandatory: bool) {
    instr.with_attrs(|attrs| {
        let def = attrs.define(name, ValueType::String);
        def.category_mut(AttributeCategory::Both);
        if mandatory {
            def.mandatory();
        }
    });
}

/// Constructor for one instruction type tag; receives the parsed children.
pub type InstructionBuilder =
    Box<dyn Fn(Vec<Instruction>) -> Result<Instruction, InvalidOperationError> + Send + Sync>;

/// Type-tag keyed instruction constructors, seeded with the built-in
/// catalogue.
pub struct InstructionRegistry {
    builders: IndexMap<String, InstructionBuilder>,
}

impl InstructionRegistry {
    /// Registry with every built-in instruction registered.
    pub fn new() -> Self {
        let mut registry = InstructionRegistry {
            builders: IndexMap::new(),
        };
        registry.register_compound("Sequence", sequence);
        registry.register_compound("Fallback", fallback);
        registry.register_compound("ParallelSequence", parallel_sequence);
        registry.register_decorator("Inverter", inverter);
        registry.register_decorator("ForceSuccess", force_success);
        registry.register_decorator("Repeat", repeat);
        registry.register_leaf("Include", include);
        registry.register_leaf("Wait", wait);
        registry.register_leaf("Equals", equals);
        registry.register_leaf("GreaterThanOrEqual", greater_than_or_equal);
        registry.register_leaf("AddElement", add_element);
        registry.register_leaf("Copy", copy);
        registry.register_leaf("Message", message);
        registry.register_leaf("Log", log_message);
        registry.register_leaf("Output", output_value);
        registry.register_leaf("UserConfirmation", user_confirmation);
        registry.register_leaf("UserChoice", user_choice);
        registry.register_leaf("UserInput", user_input);
        registry
    }

    /// Register a compound constructor taking any number of children.
    pub fn register_compound(
        &mut self,
        tag: &str,
        builder: impl Fn(Vec<Instruction>) -> Instruction + Send + Sync + 'static,
    ) {
        self.builders
            .insert(tag.to_string(), Box::new(move |children| Ok(builder(children))));
    }

    /// Register a decorator constructor taking exactly one child.
    pub fn register_decorator(
        &mut self,
        tag: &str,
        builder: impl Fn(Instruction) -> Instruction + Send + Sync + 'static,
    ) {
        let tag_owned = tag.to_string();
        self.builders.insert(
            tag.to_string(),
            Box::new(move |mut children| {
                if children.len() != 1 {
                    return Err(InvalidOperationError(format!(
                        "instruction <{tag_owned}> takes exactly one child, got {}",
                        children.len()
                    )));
                }
                Ok(builder(children.remove(0)))
            }),
        );
    }

    /// Register a leaf constructor taking no children.
    pub fn register_leaf(
        &mut self,
        tag: &str,
        builder: impl Fn() -> Instruction + Send + Sync + 'static,
    ) {
        let tag_owned = tag.to_string();
        self.builders.insert(
            tag.to_string(),
            Box::new(move |children| {
                if !children.is_empty() {
                    return Err(InvalidOperationError(format!(
                        "instruction <{tag_owned}> takes no children, got {}",
                        children.len()
                    )));
                }
                Ok(builder())
            }),
        );
    }

    /// Create an instruction by type tag.
    pub fn create(
        &self,
        tag: &str,
        children: Vec<Instruction>,
    ) -> Result<Instruction, InvalidOperationError> {
        let builder = self.builders.get(tag).ok_or_else(|| {
            InvalidOperationError(format!("unknown instruction type <{tag}>"))
        })?;
        builder(children)
    }

    /// Registered type tags in registration order.
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

impl Default for InstructionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
