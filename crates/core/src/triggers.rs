//! Trigger functions decide whether a task runs, given its upstream states.
//!
//! Tasks reference triggers by qualified name; only the functions listed in
//! [`allow_list`] may be named in a payload.

use std::sync::{Arc, OnceLock};

use drover_serialization::{FunctionAllowList, FunctionRef};

use crate::state::State;

pub type Trigger = fn(&[State]) -> bool;

pub const ALL_SUCCESSFUL: &str = "drover.triggers.all_successful";
pub const ALL_FINISHED: &str = "drover.triggers.all_finished";
pub const ANY_SUCCESSFUL: &str = "drover.triggers.any_successful";
pub const ANY_FAILED: &str = "drover.triggers.any_failed";
pub const ALWAYS_RUN: &str = "drover.triggers.always_run";

pub fn all_successful(upstream: &[State]) -> bool {
    upstream.iter().all(State::is_successful)
}

pub fn all_finished(upstream: &[State]) -> bool {
    upstream.iter().all(State::is_finished)
}

/// True with no upstream tasks.
pub fn any_successful(upstream: &[State]) -> bool {
    upstream.is_empty() || upstream.iter().any(State::is_successful)
}

/// True with no upstream tasks.
pub fn any_failed(upstream: &[State]) -> bool {
    upstream.is_empty() || upstream.iter().any(State::is_failed)
}

pub fn always_run(_upstream: &[State]) -> bool {
    true
}

pub fn allow_list() -> Arc<FunctionAllowList> {
    static TRIGGERS: OnceLock<Arc<FunctionAllowList>> = OnceLock::new();
    Arc::clone(TRIGGERS.get_or_init(|| {
        Arc::new(
            FunctionAllowList::new()
                .with(ALL_SUCCESSFUL, all_successful as Trigger)
                .with(ALL_FINISHED, all_finished as Trigger)
                .with(ANY_SUCCESSFUL, any_successful as Trigger)
                .with(ANY_FAILED, any_failed as Trigger)
                .with(ALWAYS_RUN, always_run as Trigger),
        )
    }))
}

/// A resolved reference to an allow-listed trigger.
pub fn reference(name: &str) -> Option<FunctionRef> {
    allow_list().reference(name)
}

/// Evaluate a trigger reference. Unresolved references never fire.
pub fn evaluate(trigger: &FunctionRef, upstream: &[State]) -> bool {
    trigger.get::<Trigger>().is_some_and(|f| f(upstream))
}
