//! Procedure-level behavior: root resolution, preamble, reset round-trips.

use opseq_engine::catalogue::{sequence, wait};
use opseq_engine::constants;
use opseq_engine::observer::{NullObserver, Observer};
use opseq_engine::procedure::{Procedure, TypeRegistration};
use opseq_engine::variables::local_variable;
use opseq_value::Value;
use std::sync::Arc;
use std::time::Duration;

fn ui() -> Arc<dyn Observer> {
    Arc::new(NullObserver)
}

fn zero_wait() -> opseq_engine::instruction::Instruction {
    let instr = wait();
    instr.add_attribute("timeout", "0");
    instr
}

#[test]
fn single_top_instruction_is_the_root() {
    let proc = Procedure::new();
    proc.push_instruction(zero_wait());
    assert!(proc.root_instruction().is_some());
    proc.setup().unwrap();
}

#[test]
fn is_root_attribute_selects_among_many() {
    let proc = Procedure::new();
    let first = zero_wait();
    first.set_name("first");
    proc.push_instruction(first);
    let second = zero_wait();
    second.set_name("second");
    second.add_attribute(constants::IS_ROOT, "true");
    proc.push_instruction(second);

    let root = proc.root_instruction().unwrap();
    assert_eq!(root.name(), "second");
}

#[test]
fn no_root_is_a_setup_error() {
    let proc = Procedure::new();
    assert!(proc.setup().is_err());

    let proc = Procedure::new();
    proc.push_instruction(zero_wait());
    proc.push_instruction(zero_wait());
    // Two top-level instructions, neither marked as root.
    assert!(proc.setup().is_err());
}

#[test]
fn tick_timeout_defaults_to_100ms() {
    let proc = Procedure::new();
    assert_eq!(proc.tick_timeout(), Duration::from_millis(100));

    let proc = Procedure::new();
    proc.add_attribute(constants::TICK_TIMEOUT, "0.25");
    assert_eq!(proc.tick_timeout(), Duration::from_millis(250));
}

#[test]
fn preamble_type_registration_feeds_variables() {
    let proc = Procedure::new();
    proc.add_type_registration(TypeRegistration::JsonType(
        r#"{"name": "point2d", "fields": [["x", "int32"], ["y", "int32"]]}"#.to_string(),
    ));
    let var = local_variable();
    var.add_attribute(constants::NAME, "position");
    var.add_attribute(constants::TYPE, "point2d");
    var.add_attribute(constants::VALUE, r#"{"x": 1, "y": 2}"#);
    proc.add_variable("position", var).unwrap();
    proc.push_instruction(zero_wait());

    proc.setup().unwrap();
    assert_eq!(proc.workspace().get("position.y").unwrap(), Value::Int32(2));
}

#[test]
fn conflicting_type_registration_fails_setup() {
    let proc = Procedure::new();
    proc.add_type_registration(TypeRegistration::JsonType(
        r#"{"name": "pair", "fields": [["a", "int8"]]}"#.to_string(),
    ));
    proc.add_type_registration(TypeRegistration::JsonType(
        r#"{"name": "pair", "fields": [["a", "int16"]]}"#.to_string(),
    ));
    proc.push_instruction(zero_wait());
    assert!(proc.setup().is_err());
}

#[test]
fn execute_runs_the_root_to_success() {
    let proc = Procedure::new();
    proc.push_instruction(sequence(vec![zero_wait(), zero_wait()]));
    proc.setup().unwrap();
    let ui = ui();
    while !proc.status().is_finished() {
        proc.execute_single(&ui);
    }
    assert_eq!(
        proc.status(),
        opseq_engine::instruction::ExecutionStatus::Success
    );
}

#[test]
fn reset_restores_initial_variable_values() {
    let proc = Procedure::new();
    let var = local_variable();
    var.add_attribute(constants::NAME, "counter");
    var.add_attribute(constants::TYPE, "uint32");
    var.add_attribute(constants::VALUE, "1");
    proc.add_variable("counter", var).unwrap();
    proc.push_instruction(zero_wait());
    proc.setup().unwrap();

    let ws = proc.workspace();
    assert!(ws.set("counter", &Value::UInt32(42)));
    let ui = ui();
    proc.execute_single(&ui);
    assert!(proc.status().is_finished());

    proc.reset().unwrap();
    assert_eq!(
        proc.status(),
        opseq_engine::instruction::ExecutionStatus::NotStarted
    );
    // Local variables come back with their configured initial value.
    assert_eq!(ws.get("counter").unwrap(), Value::UInt32(1));
}

#[test]
fn plugin_paths_are_recorded_not_loaded() {
    let proc = Procedure::new();
    proc.add_plugin_path("libdevices.so");
    proc.push_instruction(zero_wait());
    proc.setup().unwrap();
    assert_eq!(proc.preamble().plugin_paths, vec!["libdevices.so"]);
}
