//! The control-plane facade: typed operations over the GraphQL endpoint.

use drover_core::{Flow, State};
use drover_serialization::Payload;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::auth::{AuthSession, Credentials};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphql::{Arg, Field, GraphQLResult, Operation};
use crate::results::{FlowRunInfo, RawFlowRun, RawTaskRun, TaskRunInfo};
use crate::transport::{HttpTransport, TransportClient, UreqTransport};

/// Map index of a task run that is not part of a mapped task.
pub const UNMAPPED: i64 = -1;

/// Client for the drover control plane.
///
/// Every call blocks. Token refresh mutates the client, so calls take
/// `&mut self`; wrap it in a `Mutex` to share it between threads.
pub struct Client {
    transport: TransportClient,
}

impl Client {
    pub fn new(
        graphql_server: impl Into<String>,
        transport: impl HttpTransport + 'static,
        session: AuthSession,
    ) -> Self {
        Client {
            transport: TransportClient::new(graphql_server, transport, session),
        }
    }

    /// A client over `ureq`, pointed at the configured server and holding
    /// the configured (or stored) token.
    pub fn from_config(config: &Config) -> Self {
        Client::new(
            config.cloud.graphql.clone(),
            UreqTransport::new(),
            AuthSession::from_config(config),
        )
    }

    pub fn graphql_server(&self) -> &str {
        self.transport.server()
    }

    pub fn token(&self) -> Option<&str> {
        self.transport.session().token()
    }

    pub fn session(&self) -> &AuthSession {
        self.transport.session()
    }

    // ── Auth ──────────────────────────────────────────────────────────────

    pub fn login(&mut self, credentials: &Credentials) -> Result<()> {
        self.transport.login(credentials)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.transport.session_mut().logout()
    }

    pub fn refresh_token(&mut self) -> Result<()> {
        self.transport.refresh()
    }

    // ── Raw requests ──────────────────────────────────────────────────────

    pub fn get(&mut self, path: &str, params: Payload, server: Option<&str>) -> Result<Payload> {
        self.transport.get(path, params, server)
    }

    pub fn post(&mut self, path: &str, params: Payload, server: Option<&str>) -> Result<Payload> {
        self.transport.post(path, params, server)
    }

    /// Run `operation` with `variables`, which travel JSON-encoded.
    ///
    /// A non-empty `errors` list in the response becomes [`Error::GraphQL`].
    pub fn graphql(&mut self, operation: &Operation, variables: Payload) -> Result<GraphQLResult> {
        let mut params = Payload::new();
        params.insert("query".to_string(), Value::String(operation.to_string()));
        params.insert(
            "variables".to_string(),
            Value::String(Value::Object(variables).to_string()),
        );
        let mut response = self.transport.post("", params, None)?;

        if let Some(errors) = response.remove("errors") {
            let errors = match errors {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other => vec![other],
            };
            if !errors.is_empty() {
                return Err(Error::GraphQL { errors });
            }
        }
        Ok(GraphQLResult::new(
            response.remove("data").unwrap_or(Value::Null),
        ))
    }

    // ── Flows ─────────────────────────────────────────────────────────────

    /// Register `flow` with the control plane and return its id.
    pub fn deploy(
        &mut self,
        flow: &Flow,
        project_id: Option<&str>,
        set_schedule_active: bool,
    ) -> Result<String> {
        if flow.schedule.is_some() && flow.required_parameters().next().is_some() {
            return Err(Error::Rejected(
                "flows with required parameters can not be scheduled automatically".to_string(),
            ));
        }
        let serialized = flow.serialize()?;

        let create = Operation::mutation()
            .variable("input", "createFlowInput!")
            .select(
                Field::new("createFlow")
                    .arg("input", Arg::variable("input"))
                    .fields(["id", "error"]),
            );
        let result = self.graphql(
            &create,
            variables(json!({
                "input": {"projectId": project_id, "serializedFlow": serialized}
            })),
        )?;
        reject_on_error(&result, "createFlow.error")?;
        let flow_id = result
            .str("createFlow.id")
            .ok_or_else(|| Error::InvalidResponse("createFlow returned no id".to_string()))?
            .to_string();
        tracing::info!(flow = %flow.name, flow_id = %flow_id, "deployed flow");

        if set_schedule_active {
            let activate = Operation::mutation()
                .variable("input", "setFlowScheduleStateInput!")
                .select(
                    Field::new("setFlowScheduleState")
                        .arg("input", Arg::variable("input"))
                        .field("error"),
                );
            let result = self.graphql(
                &activate,
                variables(json!({"input": {"flowId": flow_id, "setActive": true}})),
            )?;
            reject_on_error(&result, "setFlowScheduleState.error")?;
        }
        Ok(flow_id)
    }

    /// Schedule a run of `flow_id`; without a start time it starts now.
    pub fn create_flow_run(
        &mut self,
        flow_id: &str,
        parameters: Option<Payload>,
        scheduled_start_time: Option<OffsetDateTime>,
    ) -> Result<String> {
        let mut input = Payload::new();
        input.insert("flowId".to_string(), Value::String(flow_id.to_string()));
        if let Some(parameters) = parameters {
            input.insert("parameters".to_string(), Value::Object(parameters));
        }
        if let Some(start) = scheduled_start_time {
            let start = start.format(&Rfc3339).map_err(|e| {
                Error::Rejected(format!("scheduled start time is not RFC 3339: {}", e))
            })?;
            input.insert("scheduledStartTime".to_string(), Value::String(start));
        }

        let create = Operation::mutation()
            .variable("input", "createFlowRunInput!")
            .select(
                Field::new("createFlowRun")
                    .arg("input", Arg::variable("input"))
                    .select(Field::new("flow_run").field("id")),
            );
        let result = self.graphql(&create, variables(json!({ "input": input })))?;
        result
            .str("createFlowRun.flow_run.id")
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("createFlowRun returned no id".to_string()))
    }

    /// Version, state and non-mapped task runs of one flow run.
    pub fn get_flow_run_info(&mut self, flow_run_id: &str) -> Result<FlowRunInfo> {
        let query = Operation::query().select(
            Field::new("flow_run_by_pk")
                .arg("id", flow_run_id)
                .fields([
                    "parameters",
                    "version",
                    "scheduled_start_time",
                    "serialized_state",
                ])
                .select(
                    Field::new("task_runs")
                        .arg("where", json!({"map_index": {"_eq": UNMAPPED}}))
                        .fields(["id", "task_id", "version", "serialized_state"]),
                ),
        );
        let result = self.graphql(&query, Payload::new())?;
        if !result.is_set("flow_run_by_pk") {
            return Err(Error::NotFound(format!(
                "flow run ID not found: \"{}\"",
                flow_run_id
            )));
        }
        result
            .decode::<RawFlowRun>("flow_run_by_pk")?
            .into_info(flow_run_id)
    }

    /// Fetch the task run for `task_id` in `flow_run_id`, creating it if the
    /// control plane has none yet. `None` means not mapped.
    pub fn get_task_run_info(
        &mut self,
        flow_run_id: &str,
        task_id: &str,
        map_index: Option<i64>,
    ) -> Result<TaskRunInfo> {
        let mutation = Operation::mutation().select(
            Field::new("getOrCreateTaskRun")
                .arg(
                    "input",
                    Arg::object([
                        ("flowRunId", Arg::from(flow_run_id)),
                        ("taskId", Arg::from(task_id)),
                        ("mapIndex", Arg::from(map_index.unwrap_or(UNMAPPED))),
                    ]),
                )
                .select(Field::new("task_run").fields(["id", "version", "serialized_state"]))
                .field("error"),
        );
        let result = self.graphql(&mutation, Payload::new())?;
        reject_on_error(&result, "getOrCreateTaskRun.error")?;
        if !result.is_set("getOrCreateTaskRun.task_run") {
            return Err(Error::NotFound(format!(
                "no task run for task \"{}\" in flow run \"{}\"",
                task_id, flow_run_id
            )));
        }
        result
            .decode::<RawTaskRun>("getOrCreateTaskRun.task_run")?
            .into_info(Some(task_id))
    }

    // ── States ────────────────────────────────────────────────────────────

    /// Move a flow run to `state`. `version` must be the counter last read;
    /// a stale one is [`Error::VersionMismatch`].
    pub fn set_flow_run_state(
        &mut self,
        flow_run_id: &str,
        version: i64,
        state: &State,
    ) -> Result<()> {
        self.set_state("setFlowRunState", "flowRunId", flow_run_id, version, state)
    }

    pub fn set_task_run_state(
        &mut self,
        task_run_id: &str,
        version: i64,
        state: &State,
    ) -> Result<()> {
        self.set_state("setTaskRunState", "taskRunId", task_run_id, version, state)
    }

    fn set_state(
        &mut self,
        mutation_name: &str,
        id_key: &str,
        id: &str,
        version: i64,
        state: &State,
    ) -> Result<()> {
        let serialized = state.serialize()?;
        let mutation = Operation::mutation().variable("state", "JSON!").select(
            Field::new(mutation_name)
                .arg(
                    "input",
                    Arg::object([
                        (id_key, Arg::from(id)),
                        ("version", Arg::from(version)),
                        ("state", Arg::variable("state")),
                    ]),
                )
                .field("error"),
        );
        let result = self.graphql(&mutation, variables(json!({ "state": serialized })))?;
        if let Some(error) = field_error(&result, &format!("{}.error", mutation_name)) {
            return Err(if error.to_ascii_lowercase().contains("version") {
                Error::VersionMismatch(error)
            } else {
                Error::Rejected(error)
            });
        }
        tracing::debug!(id, version, state = state.name(), "state updated");
        Ok(())
    }

    // ── Heartbeats ────────────────────────────────────────────────────────

    /// Heartbeat a flow run. Errors the server reports are logged and
    /// dropped; transport and authorization failures are not.
    pub fn update_flow_run_heartbeat(&mut self, flow_run_id: &str) -> Result<()> {
        self.heartbeat("updateFlowRunHeartbeat", "flowRunId", flow_run_id)
    }

    pub fn update_task_run_heartbeat(&mut self, task_run_id: &str) -> Result<()> {
        self.heartbeat("updateTaskRunHeartbeat", "taskRunId", task_run_id)
    }

    fn heartbeat(&mut self, mutation_name: &str, id_key: &str, id: &str) -> Result<()> {
        let mutation = Operation::mutation().select(
            Field::new(mutation_name)
                .arg("input", Arg::object([(id_key, Arg::from(id))]))
                .field("error"),
        );
        match self.graphql(&mutation, Payload::new()) {
            Ok(result) => {
                if let Some(error) = field_error(&result, &format!("{}.error", mutation_name)) {
                    tracing::warn!(id, error = %error, "heartbeat rejected");
                }
                Ok(())
            }
            Err(e) if e.is_client_error() => {
                tracing::warn!(id, error = %e, "heartbeat failed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ── Secrets ───────────────────────────────────────────────────────────

    pub fn set_secret(&mut self, name: &str, value: Value) -> Result<()> {
        let mutation = Operation::mutation().variable("value", "JSON!").select(
            Field::new("setSecret")
                .arg(
                    "input",
                    Arg::object([("name", Arg::from(name)), ("value", Arg::variable("value"))]),
                )
                .field("error"),
        );
        let result = self.graphql(&mutation, variables(json!({ "value": value })))?;
        reject_on_error(&result, "setSecret.error")?;
        tracing::info!(name, "secret set");
        Ok(())
    }
}

fn variables(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// The `error` member at `path`, if the server set one.
fn field_error(result: &GraphQLResult, path: &str) -> Option<String> {
    match result.get(path)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn reject_on_error(result: &GraphQLResult, path: &str) -> Result<()> {
    match field_error(result, path) {
        Some(error) => Err(Error::Rejected(error)),
        None => Ok(()),
    }
}
