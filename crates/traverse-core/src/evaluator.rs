//! Step evaluator: one step evaluation with retries and catch routing.
//!
//! Each attempt resolves parameters through the template bridge, invokes the
//! activity under the cancellation token, applies returned patches and the
//! `store` write (success only), and runs edge matching. Failures walk the
//! step's retry policies (sleeping the backoff between attempts) and then
//! its catch policies; an unhandled failure terminates the path.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use traverse_types::error::ErrorKind;
use traverse_types::event::ExecutionEvent;
use traverse_types::workflow::{EdgeMode, StepDefinition};
use uuid::Uuid;

use crate::activity::ActivityContext;
use crate::edge::match_edges;
use crate::event::CallbackChain;
use crate::expression::ExpressionEngine;
use crate::logger::{ActivityLogRecord, ActivityLogger};
use crate::path::Path;
use crate::registry::ActivityRegistry;
use crate::retry::RetrySelector;
use crate::state::StoreTarget;
use crate::template::resolve_params;

// ---------------------------------------------------------------------------
// Failure type
// ---------------------------------------------------------------------------

/// An error that escaped a step evaluator and terminated its path.
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    pub kind: ErrorKind,
    pub path_id: String,
    pub step: String,
    pub message: String,
}

impl ExecutionFailure {
    fn new(kind: ErrorKind, path: &Path, step: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            path_id: path.id.clone(),
            step: step.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "step '{}' failed on path '{}' ({}): {}",
            self.step, self.path_id, self.kind, self.message
        )
    }
}

impl std::error::Error for ExecutionFailure {}

// ---------------------------------------------------------------------------
// Engine context
// ---------------------------------------------------------------------------

/// The non-generic slice of execution state the evaluator needs.
pub(crate) struct EngineContext {
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub registry: Arc<ActivityRegistry>,
    pub engine: Arc<dyn ExpressionEngine>,
    pub callbacks: CallbackChain,
    pub logger: Arc<dyn ActivityLogger>,
    pub cancel: CancellationToken,
}

/// What a completed step evaluation tells the scheduler to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// Continue to these targets (non-empty; more than one forks the path).
    Advance(Vec<String>),
    /// The step was terminal or no edge matched; the path terminates.
    Finished,
    /// A catch handler routed the path to this step.
    Caught(String),
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate the path's current step to completion, including retries and
/// catch routing.
pub(crate) async fn evaluate_step(
    cx: &EngineContext,
    path: &mut Path,
    step: &StepDefinition,
    default_mode: EdgeMode,
) -> Result<StepOutcome, ExecutionFailure> {
    let started = Instant::now();
    cx.callbacks.emit(&ExecutionEvent::StepStarted {
        execution_id: cx.execution_id,
        workflow: cx.workflow_name.clone(),
        path_id: path.id.clone(),
        step: step.name.clone(),
    });

    let result = evaluate_with_recovery(cx, path, step, default_mode).await;

    cx.callbacks.emit(&ExecutionEvent::StepFinished {
        execution_id: cx.execution_id,
        workflow: cx.workflow_name.clone(),
        path_id: path.id.clone(),
        step: step.name.clone(),
        duration_ms: started.elapsed().as_millis() as u64,
        error: result.as_ref().err().map(|f| f.to_string()),
    });
    result
}

async fn evaluate_with_recovery(
    cx: &EngineContext,
    path: &mut Path,
    step: &StepDefinition,
    default_mode: EdgeMode,
) -> Result<StepOutcome, ExecutionFailure> {
    loop {
        if cx.cancel.is_cancelled() {
            return Err(ExecutionFailure::new(
                ErrorKind::Canceled,
                path,
                &step.name,
                "execution canceled",
            ));
        }

        let failure = match run_attempt(cx, path, step, default_mode).await {
            Ok(outcome) => return Ok(outcome),
            Err(failure) => failure,
        };

        if let Some(delay) = RetrySelector::select_retry(&step.retry, failure.kind, path.attempt)
        {
            tracing::debug!(
                execution_id = %cx.execution_id,
                path_id = path.id.as_str(),
                step = step.name.as_str(),
                attempt = path.attempt,
                delay_ms = delay.as_millis() as u64,
                error = failure.message.as_str(),
                "retrying step after backoff"
            );
            tokio::select! {
                _ = cx.cancel.cancelled() => {
                    return Err(ExecutionFailure::new(
                        ErrorKind::Canceled,
                        path,
                        &step.name,
                        "execution canceled during retry backoff",
                    ));
                }
                _ = tokio::time::sleep(delay) => {}
            }
            path.attempt += 1;
            continue;
        }

        if let Some(next) = RetrySelector::select_catch(&step.catch, failure.kind) {
            tracing::debug!(
                execution_id = %cx.execution_id,
                path_id = path.id.as_str(),
                step = step.name.as_str(),
                next,
                error = failure.message.as_str(),
                "routing failure to catch handler"
            );
            return Ok(StepOutcome::Caught(next.to_string()));
        }

        return Err(failure);
    }
}

/// One attempt: resolve params, invoke the activity, store the result, match
/// edges. No state is written unless the activity succeeds.
async fn run_attempt(
    cx: &EngineContext,
    path: &mut Path,
    step: &StepDefinition,
    default_mode: EdgeMode,
) -> Result<StepOutcome, ExecutionFailure> {
    // 1. Resolve parameters against {inputs, state}.
    let context = path.state.to_expression_context();
    let params = resolve_params(&step.params, &context, cx.engine.as_ref())
        .map_err(|e| ExecutionFailure::new(ErrorKind::Expression, path, &step.name, e.to_string()))?;

    // 2. Activity lookup. A missing activity is fatal.
    let Some(activity) = cx.registry.get(&step.activity) else {
        return Err(ExecutionFailure::new(
            ErrorKind::Validation,
            path,
            &step.name,
            format!("unknown activity '{}'", step.activity),
        ));
    };

    // 3. Invoke under the cancellation token.
    cx.callbacks.emit(&ExecutionEvent::ActivityStarted {
        execution_id: cx.execution_id,
        workflow: cx.workflow_name.clone(),
        path_id: path.id.clone(),
        step: step.name.clone(),
        activity: step.activity.clone(),
        params: params.clone(),
    });

    let invoke_start = Instant::now();
    let actx = ActivityContext {
        execution_id: cx.execution_id,
        path_id: &path.id,
        step: &step.name,
        cancel: &cx.cancel,
        state: &path.state,
        engine: cx.engine.as_ref(),
        logger: cx.logger.as_ref(),
    };
    let result = tokio::select! {
        _ = cx.cancel.cancelled() => Err(crate::activity::ActivityError::canceled(
            "execution canceled",
        )),
        res = activity.execute(actx, params.clone()) => res,
    };
    let duration_ms = invoke_start.elapsed().as_millis() as u64;

    cx.logger.log(&ActivityLogRecord {
        execution_id: cx.execution_id,
        activity: step.activity.clone(),
        path_id: path.id.clone(),
        step: step.name.clone(),
        params: params.clone(),
        result: result.as_ref().ok().map(|o| o.value.clone()),
        error: result.as_ref().err().map(|e| e.to_string()),
        duration_ms,
        at: Utc::now(),
    });
    cx.callbacks.emit(&ExecutionEvent::ActivityFinished {
        execution_id: cx.execution_id,
        workflow: cx.workflow_name.clone(),
        path_id: path.id.clone(),
        step: step.name.clone(),
        activity: step.activity.clone(),
        duration_ms,
        result: result.as_ref().ok().map(|o| o.value.clone()),
        error: result.as_ref().err().map(|e| e.to_string()),
    });

    let output =
        result.map_err(|e| ExecutionFailure::new(e.kind, path, &step.name, e.message))?;

    // 4. Success: apply script patches, then the store write (exactly once
    //    per successful attempt, before edge evaluation).
    path.state.apply_patches(&output.patches);
    if let Some(store) = &step.store {
        let target = StoreTarget::parse(store).map_err(|e| {
            ExecutionFailure::new(ErrorKind::Validation, path, &step.name, e.to_string())
        })?;
        path.state
            .set_variable(target.variable().to_string(), output.value.clone());
    }

    // 5. Edge matching on the post-write snapshot.
    if step.end {
        return Ok(StepOutcome::Finished);
    }
    let mode = step.edge_mode.unwrap_or(default_mode);
    let context = path.state.to_expression_context();
    let targets = match_edges(step, mode, &context, cx.engine.as_ref())
        .map_err(|e| ExecutionFailure::new(ErrorKind::Expression, path, &step.name, e.to_string()))?;

    if targets.is_empty() {
        Ok(StepOutcome::Finished)
    } else {
        Ok(StepOutcome::Advance(targets))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
