use std::path::Path;

use drover_client::{FlowRunInfo, TaskRunInfo};
use drover_core::State;
use drover_serialization::Payload;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::commands::{client, read_json};
use crate::{emit, Context, RunCommands};

pub(crate) fn cmd_run(ctx: &Context, command: RunCommands) {
    match command {
        RunCommands::Create {
            flow_id,
            parameters,
            start_time,
        } => cmd_create(ctx, &flow_id, parameters.as_deref(), start_time.as_deref()),
        RunCommands::Info { flow_run_id } => cmd_info(ctx, &flow_run_id),
        RunCommands::SetState {
            flow_run_id,
            version,
            state,
        } => cmd_set_state(ctx, &flow_run_id, version, &state),
    }
}

fn cmd_create(
    ctx: &Context,
    flow_id: &str,
    parameters: Option<&str>,
    start_time: Option<&str>,
) {
    let parameters: Option<Payload> = parameters.map(|raw| match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => ctx.fail("--parameters must be a JSON object"),
        Err(e) => ctx.fail(&format!("error parsing --parameters: {}", e)),
    });
    let start_time = start_time.map(|raw| match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(t) => t,
        Err(e) => ctx.fail(&format!("invalid --start-time '{}': {}", raw, e)),
    });

    let mut client = client(ctx);
    match client.create_flow_run(flow_id, parameters, start_time) {
        Ok(id) => emit(
            ctx,
            &format!("created flow run {}", id),
            json!({"flow_run_id": id}),
        ),
        Err(e) => ctx.fail(&e.to_string()),
    }
}

fn cmd_info(ctx: &Context, flow_run_id: &str) {
    let mut client = client(ctx);
    let info = match client.get_flow_run_info(flow_run_id) {
        Ok(info) => info,
        Err(e) => ctx.fail(&e.to_string()),
    };
    let json = match flow_run_json(&info) {
        Ok(json) => json,
        Err(e) => ctx.fail(&e),
    };
    emit(ctx, &flow_run_text(&info), json);
}

fn cmd_set_state(ctx: &Context, flow_run_id: &str, version: i64, state_path: &Path) {
    let payload = read_json(ctx, state_path);
    let state = match State::deserialize(&payload) {
        Ok(state) => state,
        Err(e) => ctx.fail(&format!("invalid state in '{}': {}", state_path.display(), e)),
    };

    let mut client = client(ctx);
    if let Err(e) = client.set_flow_run_state(flow_run_id, version, &state) {
        ctx.fail(&e.to_string());
    }
    emit(
        ctx,
        &format!("flow run {} is now {}", flow_run_id, state.name()),
        json!({"flow_run_id": flow_run_id, "state": state.name()}),
    );
}

pub(crate) fn cmd_heartbeat(ctx: &Context, id: &str, task: bool) {
    let mut client = client(ctx);
    let result = if task {
        client.update_task_run_heartbeat(id)
    } else {
        client.update_flow_run_heartbeat(id)
    };
    if let Err(e) = result {
        ctx.fail(&e.to_string());
    }
    emit(ctx, &format!("heartbeat sent for {}", id), json!({"id": id}));
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn describe(state: &State) -> String {
    match &state.message {
        Some(message) => format!("{} ({})", state.name(), message),
        None => state.name().to_string(),
    }
}

fn flow_run_text(info: &FlowRunInfo) -> String {
    let mut lines = vec![
        format!("flow run {}", info.id),
        format!("  version: {}", info.version),
        format!("  state:   {}", describe(&info.state)),
    ];
    if let Some(start) = info.scheduled_start_time.and_then(|t| t.format(&Rfc3339).ok()) {
        lines.push(format!("  start:   {}", start));
    }
    if !info.task_runs.is_empty() {
        lines.push("  task runs:".to_string());
        for task_run in &info.task_runs {
            lines.push(format!(
                "    {} [{}] v{}: {}",
                task_run.id,
                task_run.task_id,
                task_run.version,
                describe(&task_run.state)
            ));
        }
    }
    lines.join("\n")
}

fn state_json(state: &State) -> Result<Value, String> {
    state
        .serialize()
        .map(Value::Object)
        .map_err(|e| format!("could not serialize state: {}", e))
}

fn task_run_json(task_run: &TaskRunInfo) -> Result<Value, String> {
    Ok(json!({
        "id": task_run.id,
        "task_id": task_run.task_id,
        "version": task_run.version,
        "state": state_json(&task_run.state)?,
    }))
}

fn flow_run_json(info: &FlowRunInfo) -> Result<Value, String> {
    let task_runs = info
        .task_runs
        .iter()
        .map(task_run_json)
        .collect::<Result<Vec<_>, _>>()?;
    let start = info
        .scheduled_start_time
        .and_then(|t| t.format(&Rfc3339).ok());
    Ok(json!({
        "id": info.id,
        "version": info.version,
        "parameters": Value::Object(info.parameters.clone()),
        "scheduled_start_time": start,
        "state": state_json(&info.state)?,
        "task_runs": task_runs,
    }))
}
