//! Typed descriptors returned by the run queries.

use drover_core::State;
use drover_serialization::Payload;
use serde::Deserialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{Error, Result};

/// A flow run as the control plane sees it.
///
/// `version` is the optimistic-concurrency counter; pass it back unchanged
/// to [`Client::set_flow_run_state`](crate::Client::set_flow_run_state).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRunInfo {
    pub id: String,
    pub parameters: Payload,
    pub version: i64,
    pub scheduled_start_time: Option<OffsetDateTime>,
    pub state: State,
    /// Non-mapped task runs only.
    pub task_runs: Vec<TaskRunInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRunInfo {
    pub id: String,
    pub task_id: String,
    pub version: i64,
    pub state: State,
}

// ── Wire shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct RawFlowRun {
    #[serde(default)]
    parameters: Option<Payload>,
    version: i64,
    #[serde(default)]
    scheduled_start_time: Option<String>,
    serialized_state: Value,
    #[serde(default)]
    task_runs: Vec<RawTaskRun>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTaskRun {
    id: String,
    #[serde(default)]
    task_id: Option<String>,
    version: i64,
    serialized_state: Value,
}

impl RawFlowRun {
    pub(crate) fn into_info(self, id: &str) -> Result<FlowRunInfo> {
        let scheduled_start_time = self
            .scheduled_start_time
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let task_runs = self
            .task_runs
            .into_iter()
            .map(|raw| raw.into_info(None))
            .collect::<Result<Vec<_>>>()?;
        Ok(FlowRunInfo {
            id: id.to_string(),
            parameters: self.parameters.unwrap_or_default(),
            version: self.version,
            scheduled_start_time,
            state: State::deserialize(&self.serialized_state)?,
            task_runs,
        })
    }
}

impl RawTaskRun {
    /// `task_id` fills in for responses that do not echo it back.
    pub(crate) fn into_info(self, task_id: Option<&str>) -> Result<TaskRunInfo> {
        let task_id = self
            .task_id
            .or_else(|| task_id.map(str::to_string))
            .ok_or_else(|| Error::InvalidResponse(format!("task run {} has no task_id", self.id)))?;
        Ok(TaskRunInfo {
            state: State::deserialize(&self.serialized_state)?,
            id: self.id,
            task_id,
            version: self.version,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| Error::InvalidResponse(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::StateKind;
    use serde_json::json;

    #[test]
    fn raw_flow_run_becomes_info() {
        let raw: RawFlowRun = serde_json::from_value(json!({
            "parameters": {"x": 1},
            "version": 3,
            "scheduled_start_time": "2019-01-25T19:15:58.632412+00:00",
            "serialized_state": {"type": "Running", "__version__": "0.3.0"},
            "task_runs": [{
                "id": "tr-1",
                "task_id": "t-1",
                "version": 0,
                "serialized_state": {"type": "Pending", "__version__": "0.3.0"}
            }]
        }))
        .unwrap();
        let info = raw.into_info("fr-1").unwrap();
        assert_eq!(info.id, "fr-1");
        assert_eq!(info.version, 3);
        assert_eq!(info.parameters["x"], json!(1));
        assert_eq!(info.scheduled_start_time.unwrap().year(), 2019);
        assert_eq!(info.state.kind, StateKind::Running);
        assert_eq!(info.task_runs.len(), 1);
        assert_eq!(info.task_runs[0].task_id, "t-1");
        assert_eq!(info.task_runs[0].state.kind, StateKind::Pending);
    }

    #[test]
    fn malformed_timestamp_is_an_invalid_response() {
        let raw: RawFlowRun = serde_json::from_value(json!({
            "version": 1,
            "scheduled_start_time": "yesterday",
            "serialized_state": {"type": "Pending", "__version__": "0.3.0"}
        }))
        .unwrap();
        assert!(matches!(
            raw.into_info("fr-1"),
            Err(Error::InvalidResponse(_))
        ));
    }
}
