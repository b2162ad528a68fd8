use std::path::Path;

use drover_core::Flow;
use serde_json::json;

use crate::commands::{client, read_json};
use crate::{emit, Context};

pub(crate) fn cmd_deploy(
    ctx: &Context,
    flow_path: &Path,
    project_id: Option<&str>,
    schedule_active: bool,
) {
    let payload = read_json(ctx, flow_path);
    let flow = match Flow::deserialize(&payload) {
        Ok(flow) => flow,
        Err(e) => ctx.fail(&format!("invalid flow in '{}': {}", flow_path.display(), e)),
    };

    let mut client = client(ctx);
    match client.deploy(&flow, project_id, schedule_active) {
        Ok(id) => emit(
            ctx,
            &format!("deployed flow '{}' as {}", flow.name, id),
            json!({"flow_id": id, "name": flow.name}),
        ),
        Err(e) => ctx.fail(&e.to_string()),
    }
}
