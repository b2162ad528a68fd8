//! drover-client: talks to the drover control plane.
//!
//! - [`auth`] -- bearer-token session and the credentials file
//! - [`transport`] -- authenticated HTTP with one refresh-and-retry on 401
//! - [`graphql`] -- query builder and [`GraphQLResult`]
//! - [`Client`] -- typed operations: deploy, runs, states, heartbeats, secrets
//! - [`config`] -- `~/.drover/config.toml` plus environment overrides

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod graphql;
pub mod results;
pub mod transport;

pub use auth::{AuthSession, CredentialStore, Credentials};
pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use graphql::{Arg, Field, GraphQLResult, Operation};
pub use results::{FlowRunInfo, TaskRunInfo};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, TransportClient, UreqTransport,
};
