//! State payloads: wire shape checked against schema/state-payload.schema.json,
//! round trips for every kind, and loading payloads older clients wrote.

use std::path::Path;

use drover_core::{State, StateKind};
use drover_serialization::SchemaError;
use serde_json::{json, Value};
use time::macros::datetime;

fn validator() -> jsonschema::Validator {
    let schema_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schema/state-payload.schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: Value = serde_json::from_str(&schema_src).unwrap();
    jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e))
}

fn every_kind() -> Vec<State> {
    vec![
        State::pending(),
        State::scheduled(Some(datetime!(2019-01-01 00:00 UTC))),
        State::scheduled(None).with_message("whenever"),
        State::running().with_message("started"),
        State::success().with_result(json!({"rows": 10})),
        State::failed().with_message("boom").with_result(json!("trace")),
        State::retrying(Some(datetime!(2019-01-01 00:05 UTC)), 1),
        State::skipped(),
    ]
}

#[test]
fn serialized_states_match_the_published_schema() {
    let validator = validator();
    let mut failures = Vec::new();
    for state in every_kind() {
        let payload = Value::Object(state.serialize().unwrap());
        if let Err(error) = validator.validate(&payload) {
            failures.push(format!("{}: {}", state.name(), error));
        }
    }
    assert!(
        failures.is_empty(),
        "state payloads failed validation:\n{}",
        failures.join("\n")
    );
}

#[test]
fn every_kind_round_trips() {
    for state in every_kind() {
        let payload = state.serialize().unwrap();
        assert_eq!(payload["__version__"], json!(drover_core::DROVER_VERSION));
        assert_eq!(State::deserialize(&payload).unwrap(), state);
    }
}

#[test]
fn legacy_scheduled_payload_loads_into_the_current_type() {
    let payload = json!({
        "type": "Scheduled",
        "message": null,
        "result": null,
        "scheduled_time": "2018-12-31T23:00:00Z",
        "__version__": "0.2.5"
    });
    validator().validate(&payload).unwrap();

    let state = State::deserialize(&payload).unwrap();
    assert_eq!(
        state.kind,
        StateKind::Scheduled {
            start_time: Some(datetime!(2018-12-31 23:00 UTC))
        }
    );

    // Written back, it takes the current shape.
    let rewritten = state.serialize().unwrap();
    assert_eq!(rewritten["start_time"], json!("2018-12-31T23:00:00Z"));
    assert!(!rewritten.contains_key("scheduled_time"));
}

#[test]
fn payload_without_version_uses_the_newest_schema() {
    let state = State::deserialize(&json!({"type": "Success", "result": 3})).unwrap();
    assert_eq!(state, State::success().with_result(json!(3)));
}

#[test]
fn payloads_older_than_any_state_schema_are_rejected() {
    let err = State::deserialize(&json!({"type": "Running", "__version__": "0.1.0"})).unwrap_err();
    assert!(matches!(err, SchemaError::NoMatchingVersion { .. }));
}

#[test]
fn unknown_state_kind_is_a_validation_error() {
    let err = State::deserialize(&json!({"type": "Cancelled"})).unwrap_err();
    match err {
        SchemaError::Validation(e) => {
            assert_eq!(e.messages("type"), ["Unsupported value: Cancelled"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}
