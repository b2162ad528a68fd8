use drover_serialization::SchemaError;
use serde_json::Value;

/// All errors that can be returned by the drover client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No token is set, or the server refused the credentials.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// The GraphQL response carried a non-empty `errors` list, kept verbatim.
    #[error("graphql errors: {}", Value::Array(errors.clone()))]
    GraphQL { errors: Vec<Value> },

    /// A mutation returned an `error` string.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A state update was made against a stale version counter. Never retried.
    #[error("version mismatch: {0}")]
    VersionMismatch(String),

    /// Non-2xx HTTP status, including a second 401 after refresh.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Connection-level failure before any status was received.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Credentials file could not be written or removed.
    #[error("credentials error: {0}")]
    Credentials(#[source] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl Error {
    /// Errors the server reported about the request itself, as opposed to
    /// transport, local I/O or decoding failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::GraphQL { .. }
                | Error::Rejected(_)
                | Error::NotFound(_)
                | Error::VersionMismatch(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn graphql_errors_display_verbatim() {
        let err = Error::GraphQL {
            errors: vec![json!({"message": "no such field"})],
        };
        assert_eq!(
            err.to_string(),
            r#"graphql errors: [{"message":"no such field"}]"#
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn transport_failures_are_not_client_errors() {
        assert!(!Error::Transport("refused".into()).is_client_error());
        let status = Error::Status {
            status: 503,
            url: "http://localhost/graphql".into(),
        };
        assert_eq!(status.status(), Some(503));
        assert!(!status.is_client_error());
    }
}
