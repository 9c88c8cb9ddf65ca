//! Leaves that talk to the user without expecting a reply.

use super::{define_both_attr, define_variable_attr};
use crate::attr::AttributeCategory;
use crate::constants;
use crate::error::SetupError;
use crate::instruction::{Action, ExecContext, ExecutionStatus, Instruction};
use crate::observer::{Severity, log_warning};
use crate::procedure::Procedure;
use opseq_value::{Value, ValueType};

/// Displays its `message` attribute through the observer.
pub fn message() -> Instruction {
    let instr = Instruction::leaf("Message", Box::new(MessageAction));
    define_both_attr(&instr, constants::MESSAGE, true);
    instr
}

/// Logs its `message` attribute at the given `severity` (default `INFO`).
pub fn log_message() -> Instruction {
    let instr = Instruction::leaf("Log", Box::new(LogAction));
    define_both_attr(&instr, constants::MESSAGE, true);
    instr.with_attrs(|attrs| {
        attrs
            .define(constants::SEVERITY, ValueType::String)
            .category_mut(AttributeCategory::Literal);
    });
    instr
}

/// Presents the input variable's current value to the user through the
/// observer's put-value capability.
pub fn output_value() -> Instruction {
    let instr = Instruction::leaf("Output", Box::new(OutputAction));
    define_variable_attr(&instr, constants::INPUT_VAR, true);
    define_both_attr(&instr, constants::DESCRIPTION, false);
    instr
}

struct OutputAction;

impl Action for OutputAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let value = match instr.attribute_value::<Value>(constants::INPUT_VAR, ctx) {
            Ok(value) => value,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        let description = match instr.attribute_value_or::<String>(
            constants::DESCRIPTION,
            ctx,
            String::new(),
        ) {
            Ok(description) => description,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        if !ctx.ui.put_value(&value, &description) {
            log_warning(
                ctx.ui.as_ref(),
                &format!("{}observer refused the value", instr.warning_prolog()),
            );
            return ExecutionStatus::Failure;
        }
        ExecutionStatus::Success
    }
}

struct MessageAction;

impl Action for MessageAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        match instr.attribute_value::<String>(constants::MESSAGE, ctx) {
            Ok(text) => {
                ctx.ui.message(&text);
                ExecutionStatus::Success
            }
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                ExecutionStatus::Failure
            }
        }
    }
}

struct LogAction;

impl Action for LogAction {
    fn setup(&self, instr: &Instruction, _proc: &Procedure) -> Result<(), SetupError> {
        if let Some(name) = instr.attribute_string(constants::SEVERITY) {
            if Severity::from_name(&name).is_none() {
                return Err(SetupError::Instruction(format!(
                    "{}unknown severity [{name}]",
                    instr.error_prolog()
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let severity = instr
            .attribute_string(constants::SEVERITY)
            .and_then(|name| Severity::from_name(&name))
            .unwrap_or(Severity::Info);
        match instr.attribute_value::<String>(constants::MESSAGE, ctx) {
            Ok(text) => {
                ctx.ui.log(severity, &text);
                ExecutionStatus::Success
            }
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                ExecutionStatus::Failure
            }
        }
    }
}
