//! Terminal observer: stdout for messages, stdin for user input, `tracing`
//! for engine logs.

use opseq_engine::constants::choice_metadata;
use opseq_engine::instruction::Instruction;
use opseq_engine::observer::{
    InputFuture, Observer, Severity, UserInputReply, UserInputRequest,
};
use opseq_run::input::AsyncInputAdapter;
use opseq_value::Value;
use std::io::Write;

/// Observer for interactive terminal sessions.
pub struct TerminalObserver {
    input: AsyncInputAdapter,
}

impl TerminalObserver {
    /// Create the observer and its stdin worker.
    pub fn new() -> Self {
        TerminalObserver {
            input: AsyncInputAdapter::new(
                Box::new(|request, _id| serve_request(request)),
                // Stdin reads cannot be unblocked portably; the adapter
                // discards the eventual reply of a cancelled request.
                Box::new(|id| tracing::debug!(id, "input request cancelled")),
            ),
        }
    }
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for TerminalObserver {
    fn update_instruction_status(&self, instruction: &Instruction) {
        tracing::debug!(
            instruction = %instruction.type_tag(),
            name = %instruction.name(),
            status = %instruction.status(),
            "status update"
        );
    }

    fn variable_updated(&self, name: &str, value: &Value, connected: bool) {
        tracing::debug!(variable = %name, value = %value, connected, "variable update");
    }

    fn put_value(&self, value: &Value, description: &str) -> bool {
        if description.is_empty() {
            println!("{value}");
        } else {
            println!("{description}: {value}");
        }
        true
    }

    fn request_user_input(&self, request: UserInputRequest) -> Option<Box<dyn InputFuture>> {
        Some(Box::new(self.input.submit(request)))
    }

    fn message(&self, text: &str) {
        println!("{text}");
    }

    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => {
                tracing::error!("{message}")
            }
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Notice | Severity::Info => tracing::info!("{message}"),
            Severity::Debug => tracing::debug!("{message}"),
            Severity::Trace => tracing::trace!("{message}"),
        }
    }
}

fn serve_request(request: &UserInputRequest) -> UserInputReply {
    match request {
        UserInputRequest::Choice { options, metadata } => serve_choice(options, metadata),
        UserInputRequest::Value {
            prototype,
            description,
        } => serve_value(prototype, description),
    }
}

fn serve_choice(options: &[String], metadata: &Value) -> UserInputReply {
    if options.is_empty() {
        return UserInputReply::Choice {
            accepted: false,
            index: 0,
        };
    }
    if let Ok(text) = metadata.get_field(choice_metadata::TEXT) {
        println!("{text}");
    }
    for (index, option) in options.iter().enumerate() {
        println!("  [{index}] {option}");
    }
    let reply = loop {
        let Some(line) = prompt("choice> ") else {
            break UserInputReply::Choice {
                accepted: false,
                index: 0,
            };
        };
        match line.trim().parse::<usize>() {
            Ok(index) if index < options.len() => {
                break UserInputReply::Choice {
                    accepted: true,
                    index,
                };
            }
            _ => println!("enter a number between 0 and {}", options.len() - 1),
        }
    };
    reply
}

fn serve_value(prototype: &Value, description: &str) -> UserInputReply {
    let ty = prototype.value_type();
    if !description.is_empty() {
        println!("{description}");
    }
    loop {
        let Some(line) = prompt(&format!("value <{ty}>> ")) else {
            return UserInputReply::Value {
                accepted: false,
                value: Value::Empty,
            };
        };
        match opseq_value::parse_typed(&ty, line.trim()) {
            Ok(value) => {
                return UserInputReply::Value {
                    accepted: true,
                    value,
                };
            }
            Err(e) => println!("{e}"),
        }
    }
}

/// Prompt and read one line; `None` on EOF or I/O failure.
fn prompt(text: &str) -> Option<String> {
    print!("{text}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(_) => None,
    }
}
