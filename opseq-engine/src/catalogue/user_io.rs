//! Leaves that ask the user for input.
//!
//! These block inside a single tick, polling the input future against the
//! instruction's halt flag. Inside a parallel compound the blocking happens
//! on the wrapper's worker thread; as a direct child of a sequence it holds
//! the tick thread, which is what lets a halt surface as FAILURE.

use super::{define_both_attr, define_variable_attr};
use crate::constants;
use crate::instruction::{Action, ExecContext, ExecutionStatus, Instruction};
use crate::observer::{
    DialogType, interruptible_user_choice, interruptible_user_value, log_warning,
    user_choice_metadata,
};
use opseq_value::Value;

const DEFAULT_OK_TEXT: &str = "Ok";
const DEFAULT_CANCEL_TEXT: &str = "Cancel";

/// Two-button confirmation; succeeds when the user picks the first option.
pub fn user_confirmation() -> Instruction {
    let instr = Instruction::leaf("UserConfirmation", Box::new(UserConfirmationAction));
    define_both_attr(&instr, constants::DESCRIPTION, true);
    define_both_attr(&instr, constants::OK_TEXT, false);
    define_both_attr(&instr, constants::CANCEL_TEXT, false);
    instr
}

/// Choice out of the options held by an array-of-strings variable; the
/// chosen index can be written back through `outputVar`.
pub fn user_choice() -> Instruction {
    let instr = Instruction::leaf("UserChoice", Box::new(UserChoiceAction));
    define_both_attr(&instr, constants::DESCRIPTION, false);
    define_variable_attr(&instr, constants::OPTIONS_VAR, true);
    define_variable_attr(&instr, constants::OUTPUT_VAR, false);
    instr
}

/// Asks for a value of the output variable's current type and stores the
/// reply there.
pub fn user_input() -> Instruction {
    let instr = Instruction::leaf("UserInput", Box::new(UserInputAction));
    define_both_attr(&instr, constants::DESCRIPTION, true);
    define_variable_attr(&instr, constants::OUTPUT_VAR, true);
    instr
}

fn string_attr_or(
    instr: &Instruction,
    ctx: &ExecContext,
    name: &str,
    default: &str,
) -> Result<String, String> {
    instr.attribute_value_or::<String>(name, ctx, default.to_string())
}

struct UserConfirmationAction;

impl Action for UserConfirmationAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let read = |name: &str, default: &str| string_attr_or(instr, ctx, name, default);
        let (description, ok_text, cancel_text) = match (
            read(constants::DESCRIPTION, ""),
            read(constants::OK_TEXT, DEFAULT_OK_TEXT),
            read(constants::CANCEL_TEXT, DEFAULT_CANCEL_TEXT),
        ) {
            (Ok(description), Ok(ok_text), Ok(cancel_text)) => (description, ok_text, cancel_text),
            (Err(message), ..) | (_, Err(message), _) | (.., Err(message)) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        let metadata = user_choice_metadata(&description, DialogType::Confirmation);
        let options = vec![ok_text, cancel_text];
        match interruptible_user_choice(ctx.ui.as_ref(), instr, options, metadata) {
            Some((true, index)) => {
                if index == 0 {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::Failure
                }
            }
            _ => {
                log_warning(
                    ctx.ui.as_ref(),
                    &format!("{}did not receive valid choice", instr.warning_prolog()),
                );
                ExecutionStatus::Failure
            }
        }
    }
}

struct UserChoiceAction;

impl Action for UserChoiceAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let options_value = match instr.attribute_value::<Value>(constants::OPTIONS_VAR, ctx) {
            Ok(value) => value,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        let Value::Array(array) = &options_value else {
            log_warning(
                ctx.ui.as_ref(),
                &format!(
                    "{}options variable must hold an array of strings",
                    instr.warning_prolog()
                ),
            );
            return ExecutionStatus::Failure;
        };
        let mut options = Vec::with_capacity(array.len());
        for item in array.items() {
            match item {
                Value::Str(text) => options.push(text.clone()),
                _ => {
                    log_warning(
                        ctx.ui.as_ref(),
                        &format!(
                            "{}options variable must hold an array of strings",
                            instr.warning_prolog()
                        ),
                    );
                    return ExecutionStatus::Failure;
                }
            }
        }
        let description = match string_attr_or(instr, ctx, constants::DESCRIPTION, "") {
            Ok(description) => description,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        let metadata = user_choice_metadata(&description, DialogType::Selection);
        match interruptible_user_choice(ctx.ui.as_ref(), instr, options, metadata) {
            Some((true, index)) => {
                if instr.has_attribute(constants::OUTPUT_VAR) {
                    if let Err(message) = instr.set_attribute_target(
                        constants::OUTPUT_VAR,
                        ctx,
                        &Value::UInt32(index as u32),
                    ) {
                        log_warning(ctx.ui.as_ref(), &message);
                        return ExecutionStatus::Failure;
                    }
                }
                ExecutionStatus::Success
            }
            _ => {
                log_warning(
                    ctx.ui.as_ref(),
                    &format!("{}did not receive valid choice", instr.warning_prolog()),
                );
                ExecutionStatus::Failure
            }
        }
    }
}

struct UserInputAction;

impl Action for UserInputAction {
    fn execute(&self, instr: &Instruction, ctx: &ExecContext) -> ExecutionStatus {
        let prototype = match instr.attribute_value::<Value>(constants::OUTPUT_VAR, ctx) {
            Ok(value) => value,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        let description = match string_attr_or(instr, ctx, constants::DESCRIPTION, "") {
            Ok(description) => description,
            Err(message) => {
                log_warning(ctx.ui.as_ref(), &message);
                return ExecutionStatus::Failure;
            }
        };
        match interruptible_user_value(ctx.ui.as_ref(), instr, prototype, &description) {
            Some((true, value)) => {
                if let Err(message) =
                    instr.set_attribute_target(constants::OUTPUT_VAR, ctx, &value)
                {
                    log_warning(ctx.ui.as_ref(), &message);
                    return ExecutionStatus::Failure;
                }
                ExecutionStatus::Success
            }
            _ => {
                log_warning(
                    ctx.ui.as_ref(),
                    &format!("{}did not receive valid input", instr.warning_prolog()),
                );
                ExecutionStatus::Failure
            }
        }
    }
}
