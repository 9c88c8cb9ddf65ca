//! The observer contract between the engine and its embedding application.
//!
//! The engine never talks to a terminal or log backend directly. Status
//! transitions, variable updates, user I/O and log lines all flow through an
//! [`Observer`], supplied by the embedder. Callbacks arrive on the job
//! controller's background thread and on wrapper worker threads; observers
//! serialize their own state.

use crate::constants::choice_metadata;
use crate::error::InputError;
use crate::instruction::Instruction;
use opseq_value::{StructValue, Value};
use std::time::Duration;

/// Syslog-style log severities, plus trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// System is unusable.
    Emergency,
    /// Action must be taken immediately.
    Alert,
    /// Critical condition.
    Critical,
    /// Error condition.
    Error,
    /// Warning condition.
    Warning,
    /// Normal but significant.
    Notice,
    /// Informational.
    Info,
    /// Debug-level detail.
    Debug,
    /// Finest-grained detail.
    Trace,
}

impl Severity {
    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Trace => "TRACE",
        }
    }

    /// Parse a severity name, case-insensitive.
    pub fn from_name(name: &str) -> Option<Severity> {
        let severity = match name.to_ascii_uppercase().as_str() {
            "EMERGENCY" | "EMERG" => Severity::Emergency,
            "ALERT" => Severity::Alert,
            "CRITICAL" | "CRIT" => Severity::Critical,
            "ERROR" | "ERR" => Severity::Error,
            "WARNING" => Severity::Warning,
            "NOTICE" => Severity::Notice,
            "INFO" => Severity::Info,
            "DEBUG" => Severity::Debug,
            "TRACE" => Severity::Trace,
            _ => return None,
        };
        Some(severity)
    }
}

/// Hint for how a user choice could be presented. Observers may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogType {
    /// No preference.
    #[default]
    Default,
    /// Selection box.
    Selection,
    /// Confirmation dialog, typically two buttons.
    Confirmation,
    /// Alert dialog, typically one button.
    Alert,
}

impl DialogType {
    /// Numeric code stored in choice metadata.
    pub fn code(&self) -> u32 {
        match self {
            DialogType::Default => 0,
            DialogType::Selection => 1,
            DialogType::Confirmation => 2,
            DialogType::Alert => 3,
        }
    }
}

/// What kind of input the engine asks the user for.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInputRequest {
    /// A value of the prototype's type, with a description for the user.
    Value {
        /// Prototype indicating the expected type.
        prototype: Value,
        /// Free-text description.
        description: String,
    },
    /// One choice out of an ordered option list.
    Choice {
        /// The options, in display order.
        options: Vec<String>,
        /// Opaque metadata, see [`user_choice_metadata`].
        metadata: Value,
    },
}

/// The user's reply to a [`UserInputRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum UserInputReply {
    /// Reply to a value request.
    Value {
        /// False when the user dismissed the request.
        accepted: bool,
        /// The entered value; meaningful only when accepted.
        value: Value,
    },
    /// Reply to a choice request.
    Choice {
        /// False when the user dismissed the request.
        accepted: bool,
        /// Index into the request's options; meaningful only when accepted.
        index: usize,
    },
}

/// Handle to a not-yet-available user-input reply.
///
/// Dropping a still-valid future cancels the underlying request without
/// joining any worker thread.
pub trait InputFuture: Send {
    /// True until the reply has been consumed.
    fn is_valid(&self) -> bool;

    /// True when the reply has arrived and can be taken.
    fn is_ready(&self) -> bool;

    /// Block until the reply is ready or the timeout elapses.
    fn wait_for(&self, timeout: Duration) -> bool;

    /// Consume the reply. Requires `is_ready()`; at most one call succeeds.
    fn take(&mut self) -> Result<UserInputReply, InputError>;
}

/// Capability set the engine reports through.
///
/// Every method has a default that does as little as possible: input and
/// value operations report failure, everything else is ignored.
pub trait Observer: Send + Sync {
    /// An instruction's execution status changed.
    fn update_instruction_status(&self, _instruction: &Instruction) {}

    /// A workspace variable received a value update.
    fn variable_updated(&self, _name: &str, _value: &Value, _connected: bool) {}

    /// Present a value to the user. Returns false when unsupported.
    fn put_value(&self, _value: &Value, _description: &str) -> bool {
        false
    }

    /// Ask the user for input. `None` when unsupported.
    fn request_user_input(&self, _request: UserInputRequest) -> Option<Box<dyn InputFuture>> {
        None
    }

    /// Display an informational message.
    fn message(&self, _text: &str) {}

    /// Log a line at the given severity.
    fn log(&self, _severity: Severity, _message: &str) {}
}

/// Observer that refuses input and ignores everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// Log an error through an observer.
pub fn log_error(ui: &dyn Observer, message: &str) {
    ui.log(Severity::Error, message);
}

/// Log a warning through an observer.
pub fn log_warning(ui: &dyn Observer, message: &str) {
    ui.log(Severity::Warning, message);
}

/// Build the metadata structure attached to user choice requests.
pub fn user_choice_metadata(text: &str, dialog: DialogType) -> Value {
    Value::Struct(
        StructValue::new("user_choice_metadata")
            .with_field(choice_metadata::TEXT, Value::Str(text.to_string()))
            .with_field(choice_metadata::DIALOG_TYPE, Value::UInt32(dialog.code())),
    )
}

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ask for a user choice and poll the future until a reply arrives or the
/// instruction is halted. Returns `None` on halt, refusal or an invalid
/// reply shape; the future's drop cancels the pending request.
pub fn interruptible_user_choice(
    ui: &dyn Observer,
    instruction: &Instruction,
    options: Vec<String>,
    metadata: Value,
) -> Option<(bool, usize)> {
    let option_count = options.len();
    let mut future = ui.request_user_input(UserInputRequest::Choice { options, metadata })?;
    loop {
        if instruction.is_halt_requested() {
            return None;
        }
        if future.wait_for(INPUT_POLL_INTERVAL) {
            return match future.take() {
                Ok(UserInputReply::Choice { accepted, index }) if index < option_count => {
                    Some((accepted, index))
                }
                _ => None,
            };
        }
    }
}

/// Ask for a user value and poll the future until a reply arrives or the
/// instruction is halted.
pub fn interruptible_user_value(
    ui: &dyn Observer,
    instruction: &Instruction,
    prototype: Value,
    description: &str,
) -> Option<(bool, Value)> {
    let mut future = ui.request_user_input(UserInputRequest::Value {
        prototype,
        description: description.to_string(),
    })?;
    loop {
        if instruction.is_halt_requested() {
            return None;
        }
        if future.wait_for(INPUT_POLL_INTERVAL) {
            return match future.take() {
                Ok(UserInputReply::Value { accepted, value }) => Some((accepted, value)),
                _ => None,
            };
        }
    }
}
