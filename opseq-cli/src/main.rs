//! Command-line runner for opseq procedure documents.
//!
//! Loads a JSON procedure, sets it up and drives it to completion through a
//! job controller, serving user input from the terminal.

mod terminal;

use clap::Parser;
use opseq_engine::observer::{Observer, Severity};
use opseq_parse::ProcedureParser;
use opseq_run::job::{JobController, SimpleStateMonitor, StateMonitor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use terminal::TerminalObserver;

#[derive(Parser)]
#[command(
    name = "opseq",
    about = "Loads <filename>, parses it into an executable behavior tree and executes it."
)]
struct Cli {
    /// Load, parse and execute <filename>
    #[arg(short = 'f', long = "file", value_name = "filename")]
    file: PathBuf,

    /// Log to standard output at the given severity
    #[arg(short = 'v', long = "verbose", value_name = "log_level", default_value = "WARNING")]
    verbose: String,

    /// Only parse and set up the procedure without running it
    #[arg(short = 'V', long = "validate")]
    validate: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(severity) = Severity::from_name(&cli.verbose) else {
        eprintln!("unknown log level: {}", cli.verbose);
        return ExitCode::FAILURE;
    };
    init_tracing(severity);

    let parser = ProcedureParser::new();
    let proc = match parser.parse_file(&cli.file) {
        Ok(proc) => Arc::new(proc),
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    for plugin in proc.preamble().plugin_paths {
        tracing::warn!("plugin [{plugin}] requested; plugin loading is not supported");
    }

    let ui: Arc<dyn Observer> = Arc::new(TerminalObserver::new());
    let monitor = Arc::new(SimpleStateMonitor::new());
    let controller =
        match JobController::new(proc, ui, Arc::clone(&monitor) as Arc<dyn StateMonitor>) {
            Ok(controller) => controller,
            Err(e) => {
                tracing::error!("{e}");
                return ExitCode::FAILURE;
            }
        };

    if cli.validate {
        println!(
            "Procedure parsing and setup successful: {}",
            cli.file.display()
        );
        return ExitCode::SUCCESS;
    }

    controller.start();
    let end_state = monitor.wait_until_finished();
    println!("Procedure ended with state: {end_state}");
    ExitCode::SUCCESS
}

fn init_tracing(severity: Severity) {
    let level = match severity {
        Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => "error",
        Severity::Warning => "warn",
        Severity::Notice | Severity::Info => "info",
        Severity::Debug => "debug",
        Severity::Trace => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
