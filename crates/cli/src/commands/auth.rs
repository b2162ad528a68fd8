use std::io::BufRead;

use drover_client::Credentials;
use serde_json::json;

use crate::commands::client;
use crate::{emit, Context};

pub(crate) fn cmd_login(
    ctx: &Context,
    email: String,
    password: Option<String>,
    account_slug: Option<String>,
    account_id: Option<String>,
) {
    let password = match password {
        Some(p) => p,
        None => {
            let mut line = String::new();
            if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
                ctx.fail(&format!("error reading password from stdin: {}", e));
            }
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    let credentials = Credentials {
        email,
        password,
        account_slug,
        account_id,
    };

    let mut client = client(ctx);
    if let Err(e) = client.login(&credentials) {
        ctx.fail(&e.to_string());
    }
    let stored = client.session().store().path().display().to_string();
    emit(
        ctx,
        &format!("logged in as {}", credentials.email),
        json!({"logged_in": true, "credentials_path": stored}),
    );
}

pub(crate) fn cmd_logout(ctx: &Context) {
    let mut client = client(ctx);
    if let Err(e) = client.logout() {
        ctx.fail(&e.to_string());
    }
    emit(ctx, "logged out", json!({"logged_in": false}));
}
