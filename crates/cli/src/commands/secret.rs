use serde_json::{json, Value};

use crate::commands::client;
use crate::{emit, Context};

pub(crate) fn cmd_secret_set(ctx: &Context, name: &str, value: &str) {
    // `42` and `{"a": 1}` go up as JSON, anything else as a string.
    let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| json!(value));
    let mut client = client(ctx);
    if let Err(e) = client.set_secret(name, value) {
        ctx.fail(&e.to_string());
    }
    emit(ctx, &format!("secret '{}' set", name), json!({"name": name}));
}
