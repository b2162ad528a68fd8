//! Client configuration.
//!
//! Read from a TOML file (default `~/.drover/config.toml`), then overridden
//! from the environment.
//!
//! # Example
//!
//! ```toml
//! [cloud]
//! graphql = "https://api.example.com/graphql"
//! auth_token = "optional"
//! credentials_path = "/home/me/.drover/.credentials/auth_token"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const GRAPHQL_SERVER_ENV: &str = "DROVER_GRAPHQL_SERVER";
pub const AUTH_TOKEN_ENV: &str = "DROVER_AUTH_TOKEN";

const DEFAULT_GRAPHQL_SERVER: &str = "http://localhost:4200/graphql";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[cloud]` section: where the control plane lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default = "default_graphql_server")]
    pub graphql: String,
    /// Takes precedence over the credentials file.
    pub auth_token: Option<String>,
    /// Defaults to `~/.drover/.credentials/auth_token`.
    pub credentials_path: Option<PathBuf>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        CloudConfig {
            graphql: default_graphql_server(),
            auth_token: None,
            credentials_path: None,
        }
    }
}

fn default_graphql_server() -> String {
    DEFAULT_GRAPHQL_SERVER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// `~/.drover`, or `.drover` when no home directory is known.
pub fn drover_home() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".drover"))
        .unwrap_or_else(|| PathBuf::from(".drover"))
}

pub fn default_config_path() -> PathBuf {
    drover_home().join("config.toml")
}

impl Config {
    /// Parse `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Config> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "could not read '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("could not parse '{}': {}", path.display(), e)))
    }

    /// Load `path` (or the default location) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        let mut config = Config::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `DROVER_GRAPHQL_SERVER` / `DROVER_AUTH_TOKEN` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server) = lookup(GRAPHQL_SERVER_ENV).filter(|s| !s.is_empty()) {
            self.cloud.graphql = server;
        }
        if let Some(token) = lookup(AUTH_TOKEN_ENV).filter(|s| !s.is_empty()) {
            self.cloud.auth_token = Some(token);
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.cloud
            .credentials_path
            .clone()
            .unwrap_or_else(|| drover_home().join(".credentials").join("auth_token"))
    }
}
