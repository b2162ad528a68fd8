//! drover-core: the domain objects drover exchanges with the control plane.
//!
//! - [`State`] -- execution state of a flow run or task run
//! - [`Flow`], [`Task`], [`Edge`], [`Parameter`], [`Schedule`]
//! - [`triggers`] -- the allow-listed trigger functions tasks may name
//! - [`schemas`] -- every schema generation, registered explicitly
//!
//! All of them serialize through the process-wide [`registry()`].

use std::sync::OnceLock;

use drover_serialization::VersionRegistry;

/// Version tag stamped on payloads written by this release.
pub const DROVER_VERSION: &str = "0.3.0";

pub mod flow;
pub mod schemas;
pub mod state;
pub mod triggers;

// ── Convenience re-exports ───────────────────────────────────────────

pub use flow::{Edge, Flow, Parameter, Schedule, Task};
pub use state::{State, StateKind};
pub use triggers::Trigger;

/// The registry holding every drover schema, built on first use and
/// immutable afterwards.
pub fn registry() -> &'static VersionRegistry {
    static REGISTRY: OnceLock<VersionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = VersionRegistry::new();
        schemas::register_all(&mut registry);
        tracing::debug!(
            identities = registry.identities().count(),
            "registered drover schemas"
        );
        registry
    })
}
