//! Bearer-token session: login, refresh, logout and the credentials file.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::{join_url, HttpRequest, HttpTransport, Method};

/// Email/password login, optionally pinned to one account.
#[derive(Clone, Default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub account_slug: Option<String>,
    pub account_id: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            email: email.into(),
            password: password.into(),
            ..Credentials::default()
        }
    }

    fn basic_auth(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.email, self.password))
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("account_slug", &self.account_slug)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// The file mirroring the in-memory token: plain text, exactly the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored token. Missing, unreadable or empty files yield `None`.
    pub fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(token) if !token.is_empty() => {
                tracing::debug!(path = %self.path.display(), "client token set from file");
                Some(token)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "no stored token");
                None
            }
        }
    }

    /// Overwrite the file with `token`, creating parent directories.
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Credentials)?;
        }
        std::fs::write(&self.path, token).map_err(Error::Credentials)
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Credentials(e)),
        }
    }
}

fn token_from(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("token")?
        .as_str()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    token: Option<String>,
    store: CredentialStore,
}

impl AuthSession {
    /// A session holding `token`, or else whatever the store holds.
    pub fn new(token: Option<String>, store: CredentialStore) -> Self {
        let token = token.or_else(|| store.load());
        AuthSession { token, store }
    }

    pub fn from_config(config: &Config) -> Self {
        AuthSession::new(
            config.cloud.auth_token.clone(),
            CredentialStore::new(config.credentials_path()),
        )
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Exchange credentials for a token and persist it.
    pub fn login(
        &mut self,
        transport: &dyn HttpTransport,
        server: &str,
        credentials: &Credentials,
    ) -> Result<()> {
        let request = HttpRequest::new(Method::Post, join_url(server, "login_email"))
            .header("Authorization", credentials.basic_auth())
            .json(json!({
                "account_id": credentials.account_id,
                "account_slug": credentials.account_slug,
            }));
        let response = transport.send(&request)?;
        if !response.is_success() {
            tracing::debug!(status = response.status, "login refused");
            return Err(Error::Authorization("could not log in".to_string()));
        }

        self.token = token_from(&response.body);
        match &self.token {
            Some(token) => {
                self.store.save(token)?;
                tracing::info!(email = %credentials.email, "logged in");
            }
            None => tracing::warn!("login succeeded but returned no token"),
        }
        Ok(())
    }

    /// Trade the current token for a fresh one. The new token is kept in
    /// memory only; a response without a token clears it.
    pub fn refresh(&mut self, transport: &dyn HttpTransport, server: &str) -> Result<()> {
        let mut request = HttpRequest::new(Method::Post, join_url(server, "refresh_token"));
        if let Some(token) = &self.token {
            request = request.bearer(token);
        }
        let response = transport.send(&request)?;
        self.token = token_from(&response.body);
        if self.token.is_some() {
            tracing::info!("refreshed client token");
        } else {
            tracing::warn!(status = response.status, "token refresh returned no token");
        }
        Ok(())
    }

    /// Forget the token, in memory and on disk.
    pub fn logout(&mut self) -> Result<()> {
        self.store.clear()?;
        self.token = None;
        tracing::info!("logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join(".credentials").join("auth_token"));
        assert_eq!(store.load(), None);

        store.save("abc").unwrap();
        assert_eq!(store.load().as_deref(), Some("abc"));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "abc");

        store.clear().unwrap();
        assert!(!store.path().exists());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn empty_file_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("auth_token"));
        std::fs::write(store.path(), "").unwrap();
        assert_eq!(AuthSession::new(None, store).token(), None);
    }

    #[test]
    fn configured_token_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("auth_token"));
        store.save("from-file").unwrap();
        let session = AuthSession::new(Some("configured".into()), store.clone());
        assert_eq!(session.token(), Some("configured"));
        assert_eq!(AuthSession::new(None, store).token(), Some("from-file"));
    }

    #[test]
    fn token_is_read_from_json_bodies() {
        assert_eq!(token_from(r#"{"token": "t"}"#).as_deref(), Some("t"));
        assert_eq!(token_from(r#"{"token": ""}"#), None);
        assert_eq!(token_from("oops"), None);
    }

    #[test]
    fn basic_auth_encodes_email_and_password() {
        let creds = Credentials::new("a@b.c", "pw");
        assert_eq!(creds.basic_auth(), "Basic YUBiLmM6cHc=");
        assert!(!format!("{:?}", creds).contains("pw\""));
    }
}
