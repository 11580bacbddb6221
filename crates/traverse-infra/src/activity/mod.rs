//! Built-in activities.
//!
//! All built-ins take free-form parameter maps and return JSON values.
//! Blocking built-ins select against the invocation's cancellation token.

pub mod fs;
pub mod http;
pub mod json;
pub mod print;
pub mod random;
pub mod shell;
pub mod subflow;
pub mod time;

use serde_json::Value;
use traverse_core::activity::ActivityError;
use traverse_core::registry::ActivityRegistry;
use traverse_core::script::ScriptActivity;
use traverse_types::workflow::VarMap;

pub use subflow::{WorkflowCallActivity, WorkflowLibrary, child_workflow_registry};

/// Build a registry with every built-in except child workflows (those need
/// explicit wiring; see [`child_workflow_registry`]).
pub fn builtin_registry() -> ActivityRegistry {
    let mut registry = ActivityRegistry::new();
    registry.register(ScriptActivity);
    registry.register(http::HttpRequestActivity::new());
    registry.register(shell::ShellRunActivity);
    registry.register(fs::FileReadActivity);
    registry.register(fs::FileWriteActivity);
    registry.register(time::SleepActivity);
    registry.register(json::JsonParseActivity);
    registry.register(json::JsonStringifyActivity);
    registry.register(random::RandomActivity);
    registry.register(print::PrintActivity);
    registry
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

pub(crate) fn required_str<'a>(params: &'a VarMap, key: &str) -> Result<&'a str, ActivityError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ActivityError::invalid(format!("missing string parameter '{key}'")))
}

pub(crate) fn optional_str<'a>(params: &'a VarMap, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

pub(crate) fn optional_u64(params: &VarMap, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

pub(crate) fn optional_bool(params: &VarMap, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}
