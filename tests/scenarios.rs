//! Workspace-level scenarios: parsed documents driven end to end.

use opseq_engine::constants;
use opseq_engine::observer::NullObserver;
use opseq_engine::variables::local_variable;
use opseq_parse::ProcedureParser;
use opseq_run::job::{JobController, JobState, SimpleStateMonitor, StateMonitor};
use opseq_value::{StructValue, Value};
use std::sync::Arc;
use std::time::Duration;

fn run_document(text: &str) -> JobState {
    let parser = ProcedureParser::new();
    let proc = Arc::new(parser.parse_string(text, None).unwrap());
    let monitor = Arc::new(SimpleStateMonitor::new());
    let controller = JobController::new(
        proc,
        Arc::new(NullObserver),
        Arc::clone(&monitor) as Arc<dyn StateMonitor>,
    )
    .unwrap();
    controller.start();
    monitor.wait_until_finished()
}

#[test]
fn parsed_sequence_succeeds() {
    let state = run_document(
        r#"{
            "procedure": {"tickTimeout": 0.005},
            "instructions": [
                {"type": "Sequence", "children": [
                    {"type": "Wait", "attributes": {"timeout": 0}},
                    {"type": "ForceSuccess", "children": [
                        {"type": "Inverter", "children": [
                            {"type": "Wait", "attributes": {"timeout": 0}}
                        ]}
                    ]}
                ]}
            ]
        }"#,
    );
    assert_eq!(state, JobState::Succeeded);
}

#[test]
fn parsed_comparison_failure_fails_the_job() {
    let state = run_document(
        r#"{
            "procedure": {"tickTimeout": 0.005},
            "workspace": [
                {"type": "Local", "attributes": {"name": "a", "type": "uint32", "value": 1}},
                {"type": "Local", "attributes": {"name": "b", "type": "uint32", "value": 2}}
            ],
            "instructions": [
                {"type": "Sequence", "children": [
                    {"type": "Equals", "attributes": {"leftVar": "a", "rightVar": "b"}},
                    {"type": "Wait", "attributes": {"timeout": 0}}
                ]}
            ]
        }"#,
    );
    assert_eq!(state, JobState::Failed);
}

#[test]
fn parsed_parallel_thresholds() {
    let state = run_document(
        r#"{
            "procedure": {"tickTimeout": 0.005},
            "instructions": [
                {"type": "ParallelSequence",
                 "attributes": {"successThreshold": 2, "failureThreshold": 3},
                 "children": [
                    {"type": "Wait", "attributes": {"timeout": 0.01}},
                    {"type": "Wait", "attributes": {"timeout": 0.03}},
                    {"type": "Inverter", "children": [
                        {"type": "Wait", "attributes": {"timeout": 30}}
                    ]}
                ]}
            ]
        }"#,
    );
    assert_eq!(state, JobState::Succeeded);
}

#[test]
fn repeat_with_workspace_side_effects() {
    let parser = ProcedureParser::new();
    let proc = Arc::new(
        parser
            .parse_string(
                r#"{
                    "procedure": {"tickTimeout": 0.005},
                    "workspace": [
                        {"type": "Local", "attributes": {"name": "item", "type": "uint8", "value": 1}},
                        {"type": "Local", "attributes": {"name": "list", "type": "{\"element\": \"uint8\"}", "value": "[]"}}
                    ],
                    "instructions": [
                        {"type": "Repeat", "attributes": {"maxCount": 3}, "children": [
                            {"type": "AddElement", "attributes": {"inputVar": "item", "outputVar": "list"}}
                        ]}
                    ]
                }"#,
                None,
            )
            .unwrap(),
    );
    let monitor = Arc::new(SimpleStateMonitor::new());
    let controller = JobController::new(
        Arc::clone(&proc),
        Arc::new(NullObserver),
        Arc::clone(&monitor) as Arc<dyn StateMonitor>,
    )
    .unwrap();
    controller.start();
    assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);
    let list = proc.workspace().get("list").unwrap();
    let Value::Array(array) = list else {
        panic!("list is not an array");
    };
    assert_eq!(array.len(), 3);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dynamic typing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn pair_value() -> Value {
    Value::Struct(
        StructValue::new("")
            .with_field("a", Value::Int8(1))
            .with_field("b", Value::Int8(2)),
    )
}

#[test]
fn dynamic_variable_accepts_a_type_change() {
    let ws = opseq_engine::workspace::Workspace::new();
    let var = local_variable();
    var.add_attribute(constants::NAME, "v");
    var.add_attribute(constants::TYPE, "uint32");
    var.add_attribute(constants::VALUE, "0");
    var.add_attribute(constants::IS_DYNAMIC_TYPE, "true");
    ws.add("v", var).unwrap();
    ws.setup().unwrap();

    assert!(ws.set("v", &pair_value()));
    assert_eq!(ws.get("v").unwrap(), pair_value());
    assert_eq!(ws.get("v.b").unwrap(), Value::Int8(2));
}

#[test]
fn static_variable_rejects_a_type_change() {
    let ws = opseq_engine::workspace::Workspace::new();
    let var = local_variable();
    var.add_attribute(constants::NAME, "v");
    var.add_attribute(constants::TYPE, "uint32");
    var.add_attribute(constants::VALUE, "0");
    ws.add("v", var).unwrap();
    ws.setup().unwrap();

    assert!(!ws.set("v", &pair_value()));
    assert_eq!(ws.get("v").unwrap(), Value::UInt32(0));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Round trips
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn setup_teardown_round_trip_restores_locals_and_clears_files() {
    let dir = tempfile::tempdir().unwrap();
    let backing = dir.path().join("state.json");
    std::fs::write(&backing, "5").unwrap();

    let ws = opseq_engine::workspace::Workspace::new();
    let local = local_variable();
    local.add_attribute(constants::NAME, "counter");
    local.add_attribute(constants::TYPE, "uint32");
    local.add_attribute(constants::VALUE, "1");
    ws.add("counter", local).unwrap();
    let file = opseq_engine::variables::file_variable();
    file.add_attribute(constants::NAME, "persisted");
    file.add_attribute(constants::FILE, backing.to_str().unwrap());
    ws.add("persisted", file).unwrap();

    ws.setup().unwrap();
    assert!(ws.set("counter", &Value::UInt32(9)));
    assert!(ws.get("persisted").is_some());

    ws.teardown();
    // Torn down: neither variable serves values.
    assert!(ws.get("counter").is_none());
    assert!(ws.get("persisted").is_none());

    ws.setup().unwrap();
    // Locals return to their configured initial value; the file variable
    // reconnects to its backing file.
    assert_eq!(ws.get("counter").unwrap(), Value::UInt32(1));
    assert_eq!(ws.get("persisted").unwrap(), Value::UInt64(5));
}

#[test]
fn pause_and_resume_matches_uninterrupted_execution() {
    let text = r#"{
        "procedure": {"tickTimeout": 0.005},
        "workspace": [
            {"type": "Local", "attributes": {"name": "item", "type": "uint8", "value": 1}},
            {"type": "Local", "attributes": {"name": "list", "type": "{\"element\": \"uint8\"}", "value": "[]"}}
        ],
        "instructions": [
            {"type": "Repeat", "attributes": {"maxCount": 20}, "children": [
                {"type": "Sequence", "children": [
                    {"type": "AddElement", "attributes": {"inputVar": "item", "outputVar": "list"}},
                    {"type": "Wait", "attributes": {"timeout": 0.01}}
                ]}
            ]}
        ]
    }"#;
    let parser = ProcedureParser::new();

    let run = |pause: bool| -> usize {
        let proc = Arc::new(parser.parse_string(text, None).unwrap());
        let monitor = Arc::new(SimpleStateMonitor::new());
        let controller = JobController::new(
            Arc::clone(&proc),
            Arc::new(NullObserver),
            Arc::clone(&monitor) as Arc<dyn StateMonitor>,
        )
        .unwrap();
        controller.start();
        if pause {
            std::thread::sleep(Duration::from_millis(20));
            controller.pause();
            monitor.wait_for_state(JobState::Paused, Duration::from_secs(5));
            controller.start();
        }
        assert_eq!(monitor.wait_until_finished(), JobState::Succeeded);
        let Value::Array(array) = proc.workspace().get("list").unwrap() else {
            panic!("list is not an array");
        };
        array.len()
    };

    assert_eq!(run(false), run(true));
}
