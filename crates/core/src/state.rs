//! Execution states of flow runs and task runs.
//!
//! A state travels as a polymorphic payload: the `type` discriminator names
//! the kind, and the rest is loaded through that kind's versioned schema.

use drover_serialization::{
    Context, FieldValue, LoadOptions, Payload, PlainMapping, SchemaError, SchemaObject,
    ValidationError,
};
use serde_json::Value;
use time::OffsetDateTime;

use crate::registry;
use crate::schemas;

#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    Pending,
    Scheduled {
        start_time: Option<OffsetDateTime>,
    },
    Running,
    Success,
    Failed,
    Retrying {
        start_time: Option<OffsetDateTime>,
        run_count: i64,
    },
    Skipped,
}

impl StateKind {
    /// The discriminator written to payloads.
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::Pending => "Pending",
            StateKind::Scheduled { .. } => "Scheduled",
            StateKind::Running => "Running",
            StateKind::Success => "Success",
            StateKind::Failed => "Failed",
            StateKind::Retrying { .. } => "Retrying",
            StateKind::Skipped => "Skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub kind: StateKind,
    pub message: Option<String>,
    pub result: Value,
}

impl State {
    pub fn new(kind: StateKind) -> Self {
        State {
            kind,
            message: None,
            result: Value::Null,
        }
    }

    pub fn pending() -> Self {
        State::new(StateKind::Pending)
    }

    pub fn scheduled(start_time: Option<OffsetDateTime>) -> Self {
        State::new(StateKind::Scheduled { start_time })
    }

    pub fn running() -> Self {
        State::new(StateKind::Running)
    }

    pub fn success() -> Self {
        State::new(StateKind::Success)
    }

    pub fn failed() -> Self {
        State::new(StateKind::Failed)
    }

    pub fn retrying(start_time: Option<OffsetDateTime>, run_count: i64) -> Self {
        State::new(StateKind::Retrying {
            start_time,
            run_count,
        })
    }

    pub fn skipped() -> Self {
        State::new(StateKind::Skipped)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.kind,
            StateKind::Success | StateKind::Failed | StateKind::Skipped
        )
    }

    /// Skipped counts as successful for downstream triggers.
    pub fn is_successful(&self) -> bool {
        matches!(self.kind, StateKind::Success | StateKind::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, StateKind::Failed)
    }

    pub fn start_time(&self) -> Option<OffsetDateTime> {
        match self.kind {
            StateKind::Scheduled { start_time } | StateKind::Retrying { start_time, .. } => {
                start_time
            }
            _ => None,
        }
    }

    /// Dump through the newest schema of this state's kind.
    pub fn serialize(&self) -> Result<Payload, SchemaError> {
        schemas::state_one_of().dump(self, registry(), &Context::new())
    }

    /// Load any state payload, whichever kind and version wrote it.
    pub fn deserialize(data: &dyn PlainMapping) -> Result<State, SchemaError> {
        schemas::state_one_of()
            .load(data, registry(), LoadOptions::default(), &Context::new())?
            .into_object::<State>()
            .ok_or_else(|| ValidationError::new("Not a state.").into())
    }
}

impl SchemaObject for State {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "type" => Some(self.name().into()),
            "message" => Some(FieldValue::optional(self.message.clone(), FieldValue::from)),
            "result" => Some(FieldValue::Json(self.result.clone())),
            "start_time" => match self.kind {
                StateKind::Scheduled { .. } | StateKind::Retrying { .. } => {
                    Some(FieldValue::optional(self.start_time(), FieldValue::from))
                }
                _ => None,
            },
            "run_count" => match self.kind {
                StateKind::Retrying { run_count, .. } => Some(run_count.into()),
                _ => None,
            },
            _ => None,
        }
    }
}
