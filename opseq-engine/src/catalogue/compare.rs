//! Comparison leaves over workspace values.

use super::define_variable_attr;
use crate::constants;
use crate::instruction::{Action, ExecContext, ExecutionStatus, Instruction};
use crate::observer::log_warning;
use opseq_value::{Compare, Value, compare};

/// Succeeds when the two referenced workspace values are equivalent.
pub fn equals() -> Instruction {
    let instr = Instruction::leaf("Equals", Box::new(CompareAction { mode: Mode::Equality }));
    define_variable_attr(&instr, constants::LEFT_VAR, true);
    define_variable_attr(&instr, constants::RIGHT_VAR, true);
    instr
}

/// Succeeds when the left value orders greater than or equivalent to the
/// right value.
pub fn greater_than_or_equal() -> Instruction {
    let instr = Instruction::leaf(
        "GreaterThanOrEqual",
        Box::new(CompareAction {
            mode: Mode::GreaterOrEqual,
        }),
    );
    define_variable_attr(&instr, constants::LEFT_VAR, true);
    define_variable_attr(&instr, constants::RIGHT_VAR, true);
    instr
}

enum Mode {
    Equality,
    GreaterOrEqual,
}

struct CompareAction {
    mode: Mode,
}

impl Action for CompareAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let lhs = match instr.attribute_value::<Value>(constants::LEFT_VAR, ctx) {
            Ok(value) => value,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        let rhs = match instr.attribute_value::<Value>(constants::RIGHT_VAR, ctx) {
            Ok(value) => value,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        let outcome = compare(&lhs, &rhs);
        let mismatch_warning = || {
            log_warning(
                ctx.ui.as_ref(),
                &format!(
                    "{}values of types <{}> and <{}> cannot be compared",
                    instr.warning_prolog(),
                    lhs.value_type(),
                    rhs.value_type()
                ),
            );
        };
        let accepted = match self.mode {
            Mode::Equality => {
                if outcome == Compare::Unordered && lhs.value_type() != rhs.value_type() {
                    mismatch_warning();
                    return ExecutionStatus::Failure;
                }
                outcome == Compare::Equivalent
            }
            Mode::GreaterOrEqual => {
                if outcome == Compare::Unordered {
                    mismatch_warning();
                    return ExecutionStatus::Failure;
                }
                matches!(outcome, Compare::Greater | Compare::Equivalent)
            }
        };
        if accepted {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        }
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

    fn run(instr: &Instruction, ws: Workspace) -> ExecutionStatus {
        let ctx = ExecContext::new(Arc::new(NullObserver), ws);
        instr.execute_single(&ctx);
        instr.status()
    }

    #[test]
    fn equal_values_succeed() {
        let ws = workspace(&[("a", "uint32", "1"), ("b", "uint32", "1")]);
        let instr = equals();
        instr.add_attribute(constants::LEFT_VAR, "a");
        instr.add_attribute(constants::RIGHT_VAR, "b");
        assert_eq!(run(&instr, ws), ExecutionStatus::Success);
    }

    #[test]
    fn different_values_fail() {
        let ws = workspace(&[("a", "uint32", "1"), ("b", "uint32", "2")]);
        let instr = equals();
        instr.add_attribute(constants::LEFT_VAR, "a");
        instr.add_attribute(constants::RIGHT_VAR, "b");
        assert_eq!(run(&instr, ws), ExecutionStatus::Failure);
    }

    #[test]
    fn numeric_comparison_crosses_types() {
        let ws = workspace(&[("a", "float64", "2.5"), ("b", "int8", "2")]);
        let instr = greater_than_or_equal();
        instr.add_attribute(constants::LEFT_VAR, "a");
        instr.add_attribute(constants::RIGHT_VAR, "b");
        assert_eq!(run(&instr, ws), ExecutionStatus::Success);
    }

    #[test]
    fn unordered_types_fail() {
        let ws = workspace(&[("a", "string", "\"2\""), ("b", "uint32", "2")]);
        let instr = greater_than_or_equal();
        instr.add_attribute(constants::LEFT_VAR, "a");
        instr.add_attribute(constants::RIGHT_VAR, "b");
        assert_eq!(run(&instr, ws), ExecutionStatus::Failure);
    }

    #[test]
    fn missing_variable_fails() {
        let ws = workspace(&[("a", "uint32", "1")]);
        let instr = equals();
        instr.add_attribute(constants::LEFT_VAR, "a");
        instr.add_attribute(constants::RIGHT_VAR, "missing");
        assert_eq!(run(&instr, ws), ExecutionStatus::Failure);
    }

    #[test]
    fn field_paths_compare() {
        let ws = workspace(&[
            ("point", r#"{"name":"p","fields":[["x","int32"],["y","int32"]]}"#, r#"{"x":3,"y":4}"#),
            ("other", "int64", "4"),
        ]);
        let instr = equals();
        instr.add_attribute(constants::LEFT_VAR, "point.y");
        instr.add_attribute(constants::RIGHT_VAR, "other");
        assert_eq!(run(&instr, ws), ExecutionStatus::Success);
    }
}
