//! Schema registrations for every drover domain object.
//!
//! Each generation of a schema is registered explicitly. Older generations
//! stay registered so payloads written by older clients keep loading; their
//! constructors map retired field names onto the current types.

use std::sync::OnceLock;

use drover_serialization::fields::{Bool, DateTime, Int, List, Str};
use drover_serialization::{
    Bytes, Constructor, Context, Field, FieldValue, FunctionReference, JsonCompatible, Nested,
    OneOf, Record, Schema, SchemaObject, ValidationError, VersionRegistry,
};
use serde_json::Value;
use time::OffsetDateTime;

use crate::flow::{Edge, Flow, Parameter, Schedule, Task};
use crate::state::{State, StateKind};
use crate::triggers;
use crate::DROVER_VERSION;

pub const FLOW: &str = "drover.core.flow.Flow";
pub const TASK: &str = "drover.core.task.Task";
pub const EDGE: &str = "drover.core.edge.Edge";
pub const PARAMETER: &str = "drover.core.parameter.Parameter";
pub const SCHEDULE: &str = "drover.schedules.Schedule";

/// Discriminators of every state kind.
pub const STATE_KINDS: [&str; 7] = [
    "Pending",
    "Scheduled",
    "Running",
    "Success",
    "Failed",
    "Retrying",
    "Skipped",
];

/// Oldest generation of the `Scheduled` state still accepted.
pub const SCHEDULED_LEGACY_VERSION: &str = "0.2.0";

pub fn state_identity(kind: &str) -> String {
    format!("drover.engine.state.{}", kind)
}

/// Polymorphic schema over every state kind, dispatching on `type`.
pub fn state_one_of() -> &'static OneOf {
    static STATES: OnceLock<OneOf> = OnceLock::new();
    STATES.get_or_init(|| {
        STATE_KINDS.iter().fold(OneOf::new(), |one_of, kind| {
            one_of.variant(*kind, state_identity(kind))
        })
    })
}

pub fn register_all(registry: &mut VersionRegistry) {
    register_states(registry);
    register_flow(registry);
}

// ── States ───────────────────────────────────────────────────────────

fn state_schema(kind: &str, version: &str, constructor: Constructor) -> Schema {
    Schema::builder(state_identity(kind), version)
        .field(Field::new("message", Str).allow_none())
        .field(Field::new("result", JsonCompatible).allow_none())
        .construct(constructor)
        .build()
}

fn register_states(registry: &mut VersionRegistry) {
    registry.register(state_schema("Pending", DROVER_VERSION, build_pending));
    registry.register(state_schema("Running", DROVER_VERSION, build_running));
    registry.register(state_schema("Success", DROVER_VERSION, build_success));
    registry.register(state_schema("Failed", DROVER_VERSION, build_failed));
    registry.register(state_schema("Skipped", DROVER_VERSION, build_skipped));

    registry.register(
        Schema::builder(state_identity("Scheduled"), SCHEDULED_LEGACY_VERSION)
            .field(Field::new("message", Str).allow_none())
            .field(Field::new("result", JsonCompatible).allow_none())
            .field(Field::new("scheduled_time", DateTime).allow_none())
            .construct(build_scheduled_legacy)
            .build(),
    );
    registry.register(
        Schema::builder(state_identity("Scheduled"), DROVER_VERSION)
            .field(Field::new("message", Str).allow_none())
            .field(Field::new("result", JsonCompatible).allow_none())
            .field(Field::new("start_time", DateTime).allow_none())
            .construct(build_scheduled)
            .build(),
    );
    registry.register(
        Schema::builder(state_identity("Retrying"), DROVER_VERSION)
            .field(Field::new("message", Str).allow_none())
            .field(Field::new("result", JsonCompatible).allow_none())
            .field(Field::new("start_time", DateTime).allow_none())
            .field(Field::new("run_count", Int))
            .construct(build_retrying)
            .build(),
    );
}

fn state(r: &Record, kind: StateKind) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(State {
        kind,
        message: opt_string(r, "message"),
        result: r
            .get("result")
            .and_then(FieldValue::as_json)
            .cloned()
            .unwrap_or(Value::Null),
    }))
}

fn build_pending(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    state(&r, StateKind::Pending)
}

fn build_running(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    state(&r, StateKind::Running)
}

fn build_success(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    state(&r, StateKind::Success)
}

fn build_failed(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    state(&r, StateKind::Failed)
}

fn build_skipped(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    state(&r, StateKind::Skipped)
}

fn build_scheduled(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    let start_time = datetime(&r, "start_time");
    state(&r, StateKind::Scheduled { start_time })
}

fn build_scheduled_legacy(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    let start_time = datetime(&r, "scheduled_time");
    state(&r, StateKind::Scheduled { start_time })
}

fn build_retrying(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    let kind = StateKind::Retrying {
        start_time: datetime(&r, "start_time"),
        run_count: r
            .get("run_count")
            .and_then(FieldValue::as_i64)
            .unwrap_or_default(),
    };
    state(&r, kind)
}

// ── Flows ────────────────────────────────────────────────────────────

fn register_flow(registry: &mut VersionRegistry) {
    registry.register(
        Schema::builder(PARAMETER, DROVER_VERSION)
            .field(Field::new("name", Str).required())
            .field(Field::new("default", JsonCompatible).allow_none())
            .field(Field::new("required", Bool))
            .construct(build_parameter)
            .build(),
    );
    registry.register(
        Schema::builder(SCHEDULE, DROVER_VERSION)
            .field(Field::new("cron", Str).allow_none())
            .field(Field::new("interval_seconds", Int).allow_none())
            .field(Field::new("start_date", DateTime).allow_none())
            .construct(build_schedule)
            .build(),
    );
    registry.register(
        Schema::builder(TASK, DROVER_VERSION)
            .field(Field::new("name", Str).required())
            .field(Field::new("slug", Str).required())
            .field(
                Field::new("trigger", FunctionReference::new(triggers::allow_list())).required(),
            )
            .field(Field::new("max_retries", Int))
            .field(Field::new("tags", List::of(Str)))
            .construct(build_task)
            .build(),
    );
    registry.register(
        Schema::builder(EDGE, DROVER_VERSION)
            .field(Field::new("upstream", Str).required())
            .field(Field::new("downstream", Str).required())
            .field(Field::new("key", Str).allow_none())
            .construct(build_edge)
            .build(),
    );
    registry.register(
        Schema::builder(FLOW, DROVER_VERSION)
            .field(Field::new("name", Str).required())
            .field(Field::new("tasks", List::of(Nested::new(TASK))))
            .field(Field::new("edges", List::of(Nested::new(EDGE))))
            .field(Field::new("parameters", List::of(Nested::new(PARAMETER))))
            .field(
                Field::new("schedule", Nested::new(SCHEDULE).with_accessor(schedule_of))
                    .allow_none(),
            )
            .field(Field::new("artifact", Bytes))
            .construct_deferred(flow_target)
            .build(),
    );
}

fn schedule_of(flow: &dyn SchemaObject, _context: &Context) -> Option<FieldValue> {
    flow.downcast_ref::<Flow>()?
        .schedule
        .clone()
        .map(FieldValue::object)
}

fn build_parameter(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(Parameter {
        name: string(&r, "name")?,
        default: r
            .get("default")
            .and_then(FieldValue::as_json)
            .cloned()
            .unwrap_or(Value::Null),
        required: r
            .get("required")
            .and_then(FieldValue::as_bool)
            .unwrap_or_default(),
    }))
}

fn build_schedule(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(Schedule {
        cron: opt_string(&r, "cron"),
        interval_seconds: r.get("interval_seconds").and_then(FieldValue::as_i64),
        start_date: datetime(&r, "start_date"),
    }))
}

fn build_task(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    let trigger = r
        .get("trigger")
        .and_then(FieldValue::as_function)
        .cloned()
        .ok_or_else(|| ValidationError::field("trigger", "Not a function reference."))?;
    let tags = match r.get("tags").and_then(FieldValue::as_list) {
        Some(items) => items
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        None => Vec::new(),
    };
    Ok(Box::new(Task {
        name: string(&r, "name")?,
        slug: string(&r, "slug")?,
        trigger,
        max_retries: r
            .get("max_retries")
            .and_then(FieldValue::as_i64)
            .unwrap_or_default(),
        tags,
    }))
}

fn build_edge(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(Edge {
        upstream: string(&r, "upstream")?,
        downstream: string(&r, "downstream")?,
        key: opt_string(&r, "key"),
    }))
}

fn flow_target() -> Constructor {
    build_flow
}

fn build_flow(r: Record) -> Result<Box<dyn SchemaObject>, ValidationError> {
    Ok(Box::new(Flow {
        name: string(&r, "name")?,
        tasks: objects(&r, "tasks")?,
        edges: objects(&r, "edges")?,
        parameters: objects(&r, "parameters")?,
        schedule: r
            .get("schedule")
            .and_then(|v| v.downcast_ref::<Schedule>())
            .cloned(),
        artifact: r
            .get("artifact")
            .and_then(FieldValue::as_bytes)
            .map(<[u8]>::to_vec),
    }))
}

// ── Record helpers ───────────────────────────────────────────────────

fn string(r: &Record, name: &str) -> Result<String, ValidationError> {
    opt_string(r, name)
        .ok_or_else(|| ValidationError::field(name, "Missing data for required field."))
}

fn opt_string(r: &Record, name: &str) -> Option<String> {
    r.get(name).and_then(FieldValue::as_str).map(str::to_string)
}

fn datetime(r: &Record, name: &str) -> Option<OffsetDateTime> {
    r.get(name).and_then(FieldValue::as_datetime)
}

fn objects<T: SchemaObject + Clone + 'static>(
    r: &Record,
    name: &str,
) -> Result<Vec<T>, ValidationError> {
    let Some(value) = r.get(name) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_list()
        .ok_or_else(|| ValidationError::field(name, "Not a valid list."))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.downcast_ref::<T>().cloned().ok_or_else(|| {
                ValidationError::field(format!("{}.{}", name, i), "Not a valid nested object.")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_kind_is_registered_at_the_current_version() {
        let registry = crate::registry();
        for kind in STATE_KINDS {
            let versions = registry.versions(&state_identity(kind));
            assert_eq!(versions.last(), Some(&DROVER_VERSION), "{}", kind);
        }
        assert_eq!(
            registry.versions(&state_identity("Scheduled")),
            vec![SCHEDULED_LEGACY_VERSION, DROVER_VERSION]
        );
    }

    #[test]
    fn flow_schema_target_is_deferred() {
        let flow = crate::registry().resolve(FLOW, DROVER_VERSION).unwrap();
        assert!(flow.has_target());
        assert_eq!(flow.fields().len(), 6);
    }
}
