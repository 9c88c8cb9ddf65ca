//! Well-known attribute names and sigils shared across the engine.

/// Name attribute carried by instructions, variables and procedures.
pub const NAME: &str = "name";
/// Marks the root among multiple top-level instructions.
pub const IS_ROOT: &str = "isRoot";
/// Procedure tick timeout in seconds (float).
pub const TICK_TIMEOUT: &str = "tickTimeout";

/// Variable type description (JSON or registered name).
pub const TYPE: &str = "type";
/// Variable initial value (typed JSON literal).
pub const VALUE: &str = "value";
/// Opts a variable into dynamic typing.
pub const IS_DYNAMIC_TYPE: &str = "dynamicType";
/// File backing a file variable, or a procedure to include.
pub const FILE: &str = "file";
/// Pretty-print JSON written by a file variable.
pub const PRETTY: &str = "pretty";

/// Free-text description shown to the user.
pub const DESCRIPTION: &str = "description";
/// Confirm button label.
pub const OK_TEXT: &str = "okText";
/// Cancel button label.
pub const CANCEL_TEXT: &str = "cancelText";
/// Name of the variable holding the options of a user choice.
pub const OPTIONS_VAR: &str = "optionsVar";
/// Variable an instruction reads from.
pub const INPUT_VAR: &str = "inputVar";
/// Variable an instruction writes to.
pub const OUTPUT_VAR: &str = "outputVar";
/// Left-hand side variable of a comparison.
pub const LEFT_VAR: &str = "leftVar";
/// Right-hand side variable of a comparison.
pub const RIGHT_VAR: &str = "rightVar";
/// Timeout in seconds (float).
pub const TIMEOUT: &str = "timeout";
/// Success threshold of a parallel sequence.
pub const SUCCESS_THRESHOLD: &str = "successThreshold";
/// Failure threshold of a parallel sequence.
pub const FAILURE_THRESHOLD: &str = "failureThreshold";
/// Repetition count of a repeat decorator.
pub const MAX_COUNT: &str = "maxCount";
/// Message text of message/log instructions.
pub const MESSAGE: &str = "message";
/// Log severity name.
pub const SEVERITY: &str = "severity";

/// Leading sigil marking an attribute value as a workspace variable path.
pub const VARIABLE_SIGIL: char = '@';
/// Leading sigil marking an include-time placeholder.
pub const PLACEHOLDER_SIGIL: char = '$';

/// Default tick timeout applied while the root is running.
pub const DEFAULT_TICK_TIMEOUT_MS: u64 = 100;

/// Field names of the metadata attached to user choice requests.
pub mod choice_metadata {
    /// Main text shown with the choice.
    pub const TEXT: &str = "text";
    /// Dialog type hint, see [`DialogType`](crate::observer::DialogType).
    pub const DIALOG_TYPE: &str = "dialog_type";
}
