//! Flows: tasks, the edges between them, parameters and an optional schedule.

use std::collections::BTreeSet;

use drover_serialization::{
    FieldValue, FunctionRef, Payload, PlainMapping, SchemaError, SchemaObject, ValidationError,
};
use serde_json::Value;
use time::OffsetDateTime;

use crate::registry;
use crate::schemas;
use crate::triggers;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Value,
    pub required: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            default: Value::Null,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }
}

impl SchemaObject for Parameter {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            "default" => Some(FieldValue::Json(self.default.clone())),
            "required" => Some(self.required.into()),
            _ => None,
        }
    }
}

/// When a deployed flow runs on its own. Either a cron expression or a fixed
/// interval, optionally anchored at `start_date`.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub cron: Option<String>,
    pub interval_seconds: Option<i64>,
    pub start_date: Option<OffsetDateTime>,
}

impl Schedule {
    pub fn cron(expression: impl Into<String>) -> Self {
        Schedule {
            cron: Some(expression.into()),
            interval_seconds: None,
            start_date: None,
        }
    }

    pub fn interval(seconds: i64, start_date: OffsetDateTime) -> Self {
        Schedule {
            cron: None,
            interval_seconds: Some(seconds),
            start_date: Some(start_date),
        }
    }
}

impl SchemaObject for Schedule {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "cron" => Some(FieldValue::optional(self.cron.clone(), FieldValue::from)),
            "interval_seconds" => Some(FieldValue::optional(
                self.interval_seconds,
                FieldValue::from,
            )),
            "start_date" => Some(FieldValue::optional(self.start_date, FieldValue::from)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub name: String,
    pub slug: String,
    pub trigger: FunctionRef,
    pub max_retries: i64,
    pub tags: Vec<String>,
}

impl Task {
    /// A task named `name`, slugged the same, triggered when every upstream
    /// task succeeded.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Task {
            slug: name.clone(),
            name,
            trigger: triggers::reference(triggers::ALL_SUCCESSFUL)
                .unwrap_or_else(|| FunctionRef::unresolved(triggers::ALL_SUCCESSFUL)),
            max_retries: 0,
            tags: Vec::new(),
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_trigger(mut self, trigger: FunctionRef) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i64) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

impl SchemaObject for Task {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            "slug" => Some(self.slug.clone().into()),
            "trigger" => Some(FieldValue::Function(self.trigger.clone())),
            "max_retries" => Some(self.max_retries.into()),
            "tags" => Some(FieldValue::List(
                self.tags.iter().map(|t| t.as_str().into()).collect(),
            )),
            _ => None,
        }
    }
}

/// A dependency between two tasks, by slug. `key` names the downstream
/// argument the upstream result is bound to, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub upstream: String,
    pub downstream: String,
    pub key: Option<String>,
}

impl SchemaObject for Edge {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "upstream" => Some(self.upstream.clone().into()),
            "downstream" => Some(self.downstream.clone().into()),
            "key" => Some(FieldValue::optional(self.key.clone(), FieldValue::from)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub name: String,
    pub tasks: Vec<Task>,
    pub edges: Vec<Edge>,
    pub parameters: Vec<Parameter>,
    pub schedule: Option<Schedule>,
    /// Opaque build output shipped with the flow.
    pub artifact: Option<Vec<u8>>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Flow {
            name: name.into(),
            tasks: Vec::new(),
            edges: Vec::new(),
            parameters: Vec::new(),
            schedule: None,
            artifact: None,
        }
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn edge(mut self, upstream: impl Into<String>, downstream: impl Into<String>) -> Self {
        self.edges.push(Edge {
            upstream: upstream.into(),
            downstream: downstream.into(),
            key: None,
        });
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_artifact(mut self, artifact: Vec<u8>) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.required)
    }

    pub fn get_task(&self, slug: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.slug == slug)
    }

    /// Task slugs must be unique and every edge must join two known tasks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        let mut slugs = BTreeSet::new();
        for (i, task) in self.tasks.iter().enumerate() {
            if !slugs.insert(task.slug.as_str()) {
                errors.push(
                    format!("tasks.{}.slug", i),
                    format!("Duplicate task slug: {}", task.slug),
                );
            }
        }
        for (i, edge) in self.edges.iter().enumerate() {
            for end in [&edge.upstream, &edge.downstream] {
                if !slugs.contains(end.as_str()) {
                    errors.push(format!("edges.{}", i), format!("Unknown task: {}", end));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn serialize(&self) -> Result<Payload, SchemaError> {
        self.validate()?;
        registry().schema(schemas::FLOW)?.dump(self)
    }

    pub fn deserialize(data: &dyn PlainMapping) -> Result<Flow, SchemaError> {
        let flow = registry()
            .schema(schemas::FLOW)?
            .load(&data.to_plain())?
            .into_object::<Flow>()
            .ok_or_else(|| ValidationError::new("Not a flow."))?;
        flow.validate()?;
        Ok(flow)
    }
}

impl SchemaObject for Flow {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            "tasks" => Some(FieldValue::List(
                self.tasks.iter().cloned().map(FieldValue::object).collect(),
            )),
            "edges" => Some(FieldValue::List(
                self.edges.iter().cloned().map(FieldValue::object).collect(),
            )),
            "parameters" => Some(FieldValue::List(
                self.parameters
                    .iter()
                    .cloned()
                    .map(FieldValue::object)
                    .collect(),
            )),
            "artifact" => self.artifact.clone().map(FieldValue::Bytes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_parameters_are_filtered() {
        let flow = Flow::new("etl")
            .parameter(Parameter::new("x").required())
            .parameter(Parameter::new("y"));
        let names: Vec<_> = flow.required_parameters().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x"]);
    }

    #[test]
    fn edges_must_join_known_tasks() {
        let flow = Flow::new("etl")
            .task(Task::new("extract"))
            .task(Task::new("load"))
            .edge("extract", "transform");
        let err = flow.validate().unwrap_err();
        assert_eq!(err.messages("edges.0"), ["Unknown task: transform"]);
    }

    #[test]
    fn duplicate_slugs_are_rejected() {
        let flow = Flow::new("etl")
            .task(Task::new("a"))
            .task(Task::new("b").with_slug("a"));
        let err = flow.validate().unwrap_err();
        assert_eq!(err.messages("tasks.1.slug"), ["Duplicate task slug: a"]);
    }

    #[test]
    fn new_tasks_default_to_all_successful() {
        let task = Task::new("extract");
        assert_eq!(task.trigger.name(), triggers::ALL_SUCCESSFUL);
        assert!(triggers::evaluate(&task.trigger, &[]));
    }
}
