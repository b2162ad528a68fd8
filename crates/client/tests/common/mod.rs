#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use drover_client::{
    AuthSession, Client, CredentialStore, Error, HttpRequest, HttpResponse, HttpTransport,
};
use serde_json::Value;

pub const SERVER: &str = "http://drover.test/graphql";

/// Replays queued responses in order and records every request it was sent.
#[derive(Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn with(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(StubTransport {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests sent to `path` (matched against the end of the URL).
    pub fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .count()
    }
}

impl HttpTransport for StubTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Transport("no response queued".to_string()))
    }
}

pub fn ok(body: Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse::new(code, "")
}

/// A client holding `token`, whose credentials file lives under `dir`.
pub fn client(stub: &Arc<StubTransport>, token: Option<&str>, dir: &Path) -> Client {
    let store = CredentialStore::new(dir.join(".credentials").join("auth_token"));
    Client::new(
        SERVER,
        Arc::clone(stub),
        AuthSession::new(token.map(str::to_string), store),
    )
}

/// The `variables` member of a GraphQL request, decoded.
pub fn variables_of(request: &HttpRequest) -> Value {
    let encoded = request
        .body
        .as_ref()
        .and_then(|b| b["variables"].as_str())
        .expect("request has JSON-encoded variables");
    serde_json::from_str(encoded).unwrap()
}

pub fn query_of(request: &HttpRequest) -> String {
    request
        .body
        .as_ref()
        .and_then(|b| b["query"].as_str())
        .expect("request has a query")
        .to_string()
}
