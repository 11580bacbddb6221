//! `workflow.call`: run another workflow as an activity.
//!
//! The engine itself has no notion of child workflows; this activity looks
//! a definition up in a shared library, drives a nested execution with its
//! own executor, and returns the child's outputs. Nesting is bounded by
//! registering a depth-limited chain of registries: the innermost level
//! carries a stub that rejects further calls.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Value, json};
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_core::executor::WorkflowExecutor;
use traverse_core::expression::ExpressionEngine;
use traverse_core::registry::ActivityRegistry;
use traverse_types::execution::ExecutionStatus;
use traverse_types::workflow::{VarMap, WorkflowDefinition};

use super::required_str;

/// Maximum child-workflow nesting depth.
pub const MAX_CHILD_DEPTH: u32 = 5;

// ---------------------------------------------------------------------------
// WorkflowLibrary
// ---------------------------------------------------------------------------

/// Named workflow definitions available to `workflow.call`.
#[derive(Debug, Default)]
pub struct WorkflowLibrary {
    definitions: DashMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its own name, replacing any previous one.
    pub fn insert(&self, definition: WorkflowDefinition) {
        self.definitions
            .insert(definition.name.clone(), Arc::new(definition));
    }

    pub fn get(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.get(name).map(|d| Arc::clone(&d))
    }

    /// Registered workflow names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.definitions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// WorkflowCallActivity
// ---------------------------------------------------------------------------

/// Parameters: `workflow` (required name), `inputs` (optional object).
/// Runs the child to completion and returns its outputs as an object. A
/// failed child propagates its failure kind; a canceled child cancels this
/// activity.
pub struct WorkflowCallActivity {
    library: Arc<WorkflowLibrary>,
    /// Registry the child execution runs with (one nesting level down).
    registry: Arc<ActivityRegistry>,
    engine: Arc<dyn ExpressionEngine>,
}

impl WorkflowCallActivity {
    pub fn new(
        library: Arc<WorkflowLibrary>,
        registry: Arc<ActivityRegistry>,
        engine: Arc<dyn ExpressionEngine>,
    ) -> Self {
        Self {
            library,
            registry,
            engine,
        }
    }
}

impl Activity for WorkflowCallActivity {
    fn name(&self) -> &str {
        "workflow.call"
    }

    async fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let name = required_str(&params, "workflow")?;
        let inputs: VarMap = match params.get("inputs") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(Value::Null) | None => VarMap::new(),
            Some(_) => {
                return Err(ActivityError::invalid("'inputs' must be an object"));
            }
        };
        let definition = self
            .library
            .get(name)
            .ok_or_else(|| ActivityError::invalid(format!("unknown child workflow '{name}'")))?;

        tracing::debug!(child = name, "starting child workflow");
        let executor =
            WorkflowExecutor::new(Arc::clone(&self.registry), Arc::clone(&self.engine));
        let result = executor
            .execute(&definition, inputs, ctx.cancel.child_token())
            .await
            .map_err(|e| ActivityError::failed(format!("child workflow '{name}': {e}")))?;

        match result.status {
            ExecutionStatus::Completed => {
                Ok(ActivityOutput::value(json!(result.outputs)))
            }
            ExecutionStatus::Canceled => {
                Err(ActivityError::canceled(format!("child workflow '{name}' canceled")))
            }
            _ => {
                let message = result
                    .failure
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "child workflow failed".to_string());
                let kind = result
                    .failure
                    .map(|f| f.kind)
                    .unwrap_or(traverse_types::error::ErrorKind::Activity);
                Err(ActivityError {
                    kind,
                    message: format!("child workflow '{name}': {message}"),
                })
            }
        }
    }
}

/// Stub registered at the innermost nesting level.
struct ChildDepthLimit;

impl Activity for ChildDepthLimit {
    fn name(&self) -> &str {
        "workflow.call"
    }

    async fn execute(
        &self,
        _ctx: ActivityContext<'_>,
        _params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        Err(ActivityError::invalid(format!(
            "child workflow depth exceeds maximum {MAX_CHILD_DEPTH}"
        )))
    }
}

/// Build a registry whose `workflow.call` supports up to
/// [`MAX_CHILD_DEPTH`] nesting levels.
///
/// `make_base` constructs a fresh registry of ordinary activities; each
/// nesting level gets its own copy wired to the registry one level deeper,
/// and the innermost level rejects further calls.
pub fn child_workflow_registry(
    make_base: impl Fn() -> ActivityRegistry,
    library: Arc<WorkflowLibrary>,
    engine: Arc<dyn ExpressionEngine>,
) -> Arc<ActivityRegistry> {
    let mut deepest = make_base();
    deepest.register(ChildDepthLimit);
    let mut current = Arc::new(deepest);

    for _ in 0..MAX_CHILD_DEPTH {
        let mut registry = make_base();
        registry.register(WorkflowCallActivity::new(
            Arc::clone(&library),
            current,
            Arc::clone(&engine),
        ));
        current = Arc::new(registry);
    }

    current
}
