//! Leaves that move values through the workspace.

use super::define_variable_attr;
use crate::constants;
use crate::instruction::{Action, ExecContext, ExecutionStatus, Instruction};
use crate::observer::{log_error, log_warning};
use opseq_value::Value;

/// Appends the input variable's value to the array held by the output
/// variable; the element type must match.
pub fn add_element() -> Instruction {
    let instr = Instruction::leaf("AddElement", Box::new(AddElementAction));
    define_variable_attr(&instr, constants::INPUT_VAR, true);
    define_variable_attr(&instr, constants::OUTPUT_VAR, true);
    instr
}

/// Copies the input variable's value into the output variable.
pub fn copy() -> Instruction {
    let instr = Instruction::leaf("Copy", Box::new(CopyAction));
    define_variable_attr(&instr, constants::INPUT_VAR, true);
    define_variable_attr(&instr, constants::OUTPUT_VAR, true);
    instr
}

fn read_attr(instr: &Instruction, ctx: &ExecContext, name: &str) -> Option<Value> {
    match instr.attribute_value::<Value>(name, ctx) {
        Ok(value) => Some(value),
        Err(message) => {
            log_warning(ctx.ui.as_ref(), &message);
            None
        }
    }
}

struct AddElementAction;

impl Action for AddElementAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let Some(input) = read_attr(instr, ctx, constants::INPUT_VAR) else {
            return ExecutionStatus::Failure;
        };
        let Some(output) = read_attr(instr, ctx, constants::OUTPUT_VAR) else {
            return ExecutionStatus::Failure;
        };
        let output_type = output.value_type();
        let Value::Array(mut array) = output else {
            log_warning(
                ctx.ui.as_ref(),
                &format!(
                    "{}only allowed to insert into an array, got <{output_type}>",
                    instr.warning_prolog()
                ),
            );
            return ExecutionStatus::Failure;
        };
        if let Err(e) = array.push(input) {
            log_error(
                ctx.ui.as_ref(),
                &format!("{}{e}", instr.error_prolog()),
            );
            return ExecutionStatus::Failure;
        }
        if let Err(message) =
            instr.set_attribute_target(constants::OUTPUT_VAR, ctx, &Value::Array(array))
        {
            log_warning(ctx.ui.as_ref(), &message);
            return ExecutionStatus::Failure;
        }
        ExecutionStatus::Success
    }
}

struct CopyAction;

impl Action for CopyAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let Some(input) = read_attr(instr, ctx, constants::INPUT_VAR) else {
            return ExecutionStatus::Failure;
        };
        if let Err(message) = instr.set_attribute_target(constants::OUTPUT_VAR, ctx, &input) {
            log_warning(ctx.ui.as_ref(), &message);
            return ExecutionStatus::Failure;
        }
        ExecutionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{NAME, TYPE, VALUE};
    use crate::observer::NullObserver;
    use crate::variables::local_variable;
    use crate::workspace::Workspace;
    use std::sync::Arc;

    fn workspace(pairs: &[(&str, &str, &str)]) -> Workspace {
        let ws = Workspace::new();
        for (name, ty, value) in pairs {
            let var = local_variable();
            var.add_attribute(NAME, name);
            var.add_attribute(TYPE, ty);
            var.add_attribute(VALUE, value);
            ws.add(name, var).unwrap();
        }
        ws.setup().unwrap();
        ws
    }

    fn run(instr: &Instruction, ws: &Workspace) -> ExecutionStatus {
        let ctx = ExecContext::new(Arc::new(NullObserver), ws.clone());
        instr.execute_single(&ctx);
        instr.status()
    }

    #[test]
    fn appends_matching_element() {
        let ws = workspace(&[
            ("list", r#"{"element": "uint8"}"#, "[1, 2]"),
            ("item", "uint8", "3"),
        ]);
        let instr = add_element();
        instr.add_attribute(constants::INPUT_VAR, "item");
        instr.add_attribute(constants::OUTPUT_VAR, "list");
        assert_eq!(run(&instr, &ws), ExecutionStatus::Success);
        assert_eq!(ws.get("list[2]").unwrap(), Value::UInt8(3));
    }

    #[test]
    fn element_type_mismatch_fails() {
        let ws = workspace(&[
            ("list", r#"{"element": "uint8"}"#, "[1]"),
            ("item", "uint32", "3"),
        ]);
        let instr = add_element();
        instr.add_attribute(constants::INPUT_VAR, "item");
        instr.add_attribute(constants::OUTPUT_VAR, "list");
        assert_eq!(run(&instr, &ws), ExecutionStatus::Failure);
        assert!(ws.get("list[1]").is_none());
    }

    #[test]
    fn non_array_output_fails() {
        let ws = workspace(&[("scalar", "uint8", "1"), ("item", "uint8", "3")]);
        let instr = add_element();
        instr.add_attribute(constants::INPUT_VAR, "item");
        instr.add_attribute(constants::OUTPUT_VAR, "scalar");
        assert_eq!(run(&instr, &ws), ExecutionStatus::Failure);
    }

    #[test]
    fn copies_between_variables() {
        let ws = workspace(&[("src", "uint32", "11"), ("dst", "uint32", "0")]);
        let instr = copy();
        instr.add_attribute(constants::INPUT_VAR, "src");
        instr.add_attribute(constants::OUTPUT_VAR, "dst");
        assert_eq!(run(&instr, &ws), ExecutionStatus::Success);
        assert_eq!(ws.get("dst").unwrap(), Value::UInt32(11));
    }

    #[test]
    fn copy_into_incompatible_type_fails() {
        let ws = workspace(&[("src", "string", "\"text\""), ("dst", "uint32", "0")]);
        let instr = copy();
        instr.add_attribute(constants::INPUT_VAR, "src");
        instr.add_attribute(constants::OUTPUT_VAR, "dst");
        assert_eq!(run(&instr, &ws), ExecutionStatus::Failure);
        assert_eq!(ws.get("dst").unwrap(), Value::UInt32(0));
    }
}
