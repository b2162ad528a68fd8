//! One module per subcommand group. Each `cmd_*` prints its result and exits
//! with status 1 on failure.

pub(crate) mod auth;
pub(crate) mod deploy;
pub(crate) mod run;
pub(crate) mod schema;
pub(crate) mod secret;

use std::path::Path;

use drover_client::Client;
use serde_json::Value;

use crate::Context;

/// A client for the configured server, holding the configured or stored token.
pub(crate) fn client(ctx: &Context) -> Client {
    tracing::debug!(server = %ctx.config.cloud.graphql, "connecting");
    Client::from_config(&ctx.config)
}

/// Read and parse a JSON file, failing the command on any error.
pub(crate) fn read_json(ctx: &Context, path: &Path) -> Value {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => ctx.fail(&format!("error reading file '{}': {}", path.display(), e)),
    };
    match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => ctx.fail(&format!(
            "error parsing JSON in '{}': {}",
            path.display(),
            e
        )),
    }
}
