//! Authenticated HTTP requests with a single refresh-and-retry on 401.
//!
//! [`HttpTransport`] is the seam between the request state machine and the
//! wire: [`UreqTransport`] in production, in-memory stubs in tests.

use std::sync::Arc;

use drover_serialization::Payload;
use serde_json::Value;

use crate::auth::{AuthSession, Credentials};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body; `None` sends no body at all.
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as a JSON object. An empty body is an empty object.
    pub fn json(&self) -> Result<Payload> {
        if self.body.trim().is_empty() {
            return Ok(Payload::new());
        }
        match serde_json::from_str(&self.body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(Error::InvalidResponse(format!(
                "expected a JSON object, got {}",
                other
            ))),
            Err(e) => Err(Error::InvalidResponse(format!(
                "response is not JSON: {}",
                e
            ))),
        }
    }
}

/// Sends one HTTP request and returns whatever status came back.
///
/// Implementations must not turn non-2xx statuses into errors; only
/// connection-level failures are `Err`.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

// ── ureq ──────────────────────────────────────────────────────────────────────

/// Blocking transport over a shared `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        UreqTransport {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let result = match (request.method, &request.body) {
            (Method::Get, Some(body)) => with_headers(self.agent.get(url), headers)
                .force_send_body()
                .send_json(body),
            (Method::Get, None) => with_headers(self.agent.get(url), headers).call(),
            (Method::Post, Some(body)) => {
                with_headers(self.agent.post(url), headers).send_json(body)
            }
            (Method::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (Method::Delete, _) => with_headers(self.agent.delete(url), headers).call(),
        };
        let response = result
            .map_err(|e| Error::Transport(format!("{} {}: {}", request.method.as_str(), url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| Error::Transport(format!("could not read response from {}: {}", url, e)))?;
        Ok(HttpResponse { status, body })
    }
}

// ── Authenticated client ──────────────────────────────────────────────────────

/// Join a server base and an API path the way the control plane expects:
/// one slash between them and none trailing.
pub fn join_url(server: &str, path: &str) -> String {
    let joined = format!(
        "{}/{}",
        server.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    joined.trim_end_matches('/').to_string()
}

/// Issues authenticated requests and owns the session they authenticate with.
///
/// Token refresh mutates the session, so every request takes `&mut self`.
/// Share one across threads behind a `Mutex`.
pub struct TransportClient {
    server: String,
    transport: Box<dyn HttpTransport>,
    session: AuthSession,
}

impl TransportClient {
    pub fn new(
        server: impl Into<String>,
        transport: impl HttpTransport + 'static,
        session: AuthSession,
    ) -> Self {
        TransportClient {
            server: server.into(),
            transport: Box::new(transport),
            session,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AuthSession {
        &mut self.session
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        &*self.transport
    }

    pub fn login(&mut self, credentials: &Credentials) -> Result<()> {
        self.session.login(&*self.transport, &self.server, credentials)
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.session.refresh(&*self.transport, &self.server)
    }

    /// Send `params` to `path` on `server` (default: the GraphQL server).
    ///
    /// A 401 triggers exactly one token refresh and one re-send; whatever the
    /// second attempt returns is final.
    pub fn request(
        &mut self,
        method: Method,
        path: &str,
        params: Payload,
        server: Option<&str>,
    ) -> Result<HttpResponse> {
        if self.session.token().is_none() {
            return Err(Error::Authorization(
                "call login() to set the client token".to_string(),
            ));
        }
        let url = join_url(server.unwrap_or(self.server.as_str()), path);
        let body = match method {
            Method::Delete => None,
            Method::Get | Method::Post => Some(Value::Object(params)),
        };

        let mut response = self.send_authenticated(method, &url, body.clone())?;
        if response.status == 401 {
            tracing::warn!(url = %url, "request unauthorized, refreshing token");
            self.refresh()?;
            response = self.send_authenticated(method, &url, body)?;
        }

        if !response.is_success() {
            return Err(Error::Status {
                status: response.status,
                url,
            });
        }
        Ok(response)
    }

    fn send_authenticated(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<HttpResponse> {
        let token = self.session.token().ok_or_else(|| {
            Error::Authorization("token refresh did not return a token".to_string())
        })?;
        let mut request = HttpRequest::new(method, url).bearer(token);
        request.body = body;
        tracing::trace!(method = method.as_str(), url, "sending request");
        self.transport.send(&request)
    }

    pub fn get(&mut self, path: &str, params: Payload, server: Option<&str>) -> Result<Payload> {
        self.request(Method::Get, path, params, server)?.json()
    }

    pub fn post(&mut self, path: &str, params: Payload, server: Option<&str>) -> Result<Payload> {
        self.request(Method::Post, path, params, server)?.json()
    }

    pub fn delete(&mut self, path: &str, server: Option<&str>) -> Result<HttpResponse> {
        self.request(Method::Delete, path, Payload::new(), server)
    }
}
