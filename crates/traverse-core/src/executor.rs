//! Workflow executor: the path scheduler that drives an execution.
//!
//! Paths run as tasks on a `tokio::JoinSet` and make independent progress; a
//! path that forks returns its children for the scheduler to spawn. Shared
//! execution state is limited to the read-only workflow, a live-path record
//! table for checkpointing, the outputs merge, and the first-failure slot.
//! The execution completes when the live path set drains.
//!
//! # Execution flow
//!
//! 1. Validate the definition and resolve inputs (or restore paths from a
//!    checkpoint record for resume).
//! 2. Spawn one task per live path.
//! 3. Each task loops: evaluate step -> publish its path record ->
//!    checkpoint -> continue, fork, or terminate.
//! 4. On termination the path's final variables resolve declared outputs.
//! 5. Finalize: status, outputs, the `workflow_finished` callback, and a
//!    terminal checkpoint.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use traverse_types::error::ErrorKind;
use traverse_types::event::ExecutionEvent;
use traverse_types::execution::{
    CheckpointRecord, ExecutionStatus, PathRecord, SCHEMA_VERSION,
};
use traverse_types::workflow::{VarMap, WorkflowDefinition};
use uuid::Uuid;

use crate::checkpoint::{CheckpointError, CheckpointStore, NullCheckpointStore, encode_record};
use crate::definition::{WorkflowError, resolve_inputs, validate_definition};
use crate::evaluator::{EngineContext, StepOutcome, evaluate_step};
use crate::event::CallbackChain;
use crate::expression::ExpressionEngine;
use crate::logger::{ActivityLogger, NullActivityLogger};
use crate::path::Path;
use crate::registry::ActivityRegistry;
use crate::state::PathState;

pub use crate::evaluator::ExecutionFailure;

// ---------------------------------------------------------------------------
// Errors and results
// ---------------------------------------------------------------------------

/// Errors surfaced by the executor API itself (as opposed to failures of
/// the workflow being executed, which are reported in `ExecutionResult`).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Definition or input validation failed.
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Checkpoint payload could not be used for resume.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A checkpoint record names a different workflow.
    #[error("checkpoint belongs to workflow '{found}', not '{expected}'")]
    WorkflowMismatch { expected: String, found: String },
}

/// Result of a driven execution, terminal in every case.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub outputs: VarMap,
    /// The first unrecovered failure, when `status` is `Failed`.
    pub failure: Option<ExecutionFailure>,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Drives workflow executions. Generic over the checkpoint store; defaults
/// to the null store.
pub struct WorkflowExecutor<C: CheckpointStore = NullCheckpointStore> {
    registry: Arc<ActivityRegistry>,
    engine: Arc<dyn ExpressionEngine>,
    callbacks: CallbackChain,
    logger: Arc<dyn ActivityLogger>,
    checkpoints: Arc<C>,
}

impl WorkflowExecutor<NullCheckpointStore> {
    /// A new executor with no callbacks, a null logger, and no
    /// checkpointing.
    pub fn new(registry: Arc<ActivityRegistry>, engine: Arc<dyn ExpressionEngine>) -> Self {
        Self {
            registry,
            engine,
            callbacks: CallbackChain::new(),
            logger: Arc::new(NullActivityLogger),
            checkpoints: Arc::new(NullCheckpointStore),
        }
    }
}

impl<C: CheckpointStore + 'static> WorkflowExecutor<C> {
    /// Swap in a checkpoint store.
    pub fn with_checkpoint_store<C2: CheckpointStore + 'static>(
        self,
        store: Arc<C2>,
    ) -> WorkflowExecutor<C2> {
        WorkflowExecutor {
            registry: self.registry,
            engine: self.engine,
            callbacks: self.callbacks,
            logger: self.logger,
            checkpoints: store,
        }
    }

    /// Replace the callback chain.
    pub fn with_callbacks(mut self, callbacks: CallbackChain) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Replace the activity logger.
    pub fn with_logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Execute a workflow from its start step.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        inputs: VarMap,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        validate_definition(definition)?;
        let inputs = resolve_inputs(definition, inputs)?;

        let start_step = definition
            .start_step()
            .expect("validated workflow has steps")
            .name
            .clone();
        let root = Path::root(start_step, PathState::new(inputs, definition.state.clone()));

        self.run(definition, Uuid::now_v7(), vec![root], VarMap::new(), cancel)
            .await
    }

    /// Resume an execution from a checkpoint record.
    ///
    /// A record with a terminal status returns its stored result without
    /// dispatching anything.
    pub async fn resume(
        &self,
        definition: &WorkflowDefinition,
        record: CheckpointRecord,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        validate_definition(definition)?;
        if record.workflow_name != definition.name {
            return Err(EngineError::WorkflowMismatch {
                expected: definition.name.clone(),
                found: record.workflow_name,
            });
        }

        if record.status.is_terminal() {
            return Ok(ExecutionResult {
                execution_id: record.execution_id,
                status: record.status,
                outputs: record.outputs,
                failure: None,
            });
        }

        for path in &record.paths {
            if definition.step(&path.current_step).is_none() {
                return Err(EngineError::Workflow(WorkflowError::ValidationError(
                    format!(
                        "checkpoint path '{}' references unknown step '{}'",
                        path.id, path.current_step
                    ),
                )));
            }
        }

        let paths: Vec<Path> = record.paths.into_iter().map(Path::from_record).collect();
        self.run(definition, record.execution_id, paths, record.outputs, cancel)
            .await
    }

    /// List execution ids known to the checkpoint store.
    pub async fn list_checkpoints(&self) -> Result<Vec<Uuid>, EngineError> {
        Ok(self.checkpoints.list().await?)
    }

    async fn run(
        &self,
        definition: &WorkflowDefinition,
        execution_id: Uuid,
        paths: Vec<Path>,
        outputs: VarMap,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        let shared = Arc::new(Shared {
            cx: EngineContext {
                execution_id,
                workflow_name: definition.name.clone(),
                registry: Arc::clone(&self.registry),
                engine: Arc::clone(&self.engine),
                callbacks: self.callbacks.clone(),
                logger: Arc::clone(&self.logger),
                cancel,
            },
            definition: Arc::new(definition.clone()),
            checkpoints: Arc::clone(&self.checkpoints),
            records: DashMap::new(),
            outputs: Mutex::new(outputs),
            failure: Mutex::new(None),
        });

        for path in &paths {
            shared.publish(path);
        }

        shared.cx.callbacks.emit(&ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow: definition.name.clone(),
            at: Utc::now(),
        });
        tracing::info!(
            execution_id = %execution_id,
            workflow = definition.name.as_str(),
            paths = paths.len(),
            "starting workflow execution"
        );

        let run_start = Instant::now();
        shared.save_checkpoint(ExecutionStatus::Running).await;

        let mut join_set = JoinSet::new();
        for path in paths {
            join_set.spawn(run_path(Arc::clone(&shared), path));
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(children) => {
                    for child in children {
                        join_set.spawn(run_path(Arc::clone(&shared), child));
                    }
                }
                Err(e) => {
                    shared.record_failure(ExecutionFailure {
                        kind: ErrorKind::Activity,
                        path_id: String::new(),
                        step: String::new(),
                        message: format!("path task panicked: {e}"),
                    });
                }
            }
        }

        // Finalize.
        let failure = shared.failure.lock().unwrap().clone();
        let status = match &failure {
            Some(f) if f.kind == ErrorKind::Canceled => ExecutionStatus::Canceled,
            Some(_) => ExecutionStatus::Failed,
            None if shared.cx.cancel.is_cancelled() => ExecutionStatus::Canceled,
            None => ExecutionStatus::Completed,
        };

        let outputs = {
            let mut outputs = shared.outputs.lock().unwrap();
            // Constant outputs are independent of any path's state.
            for output in &definition.outputs {
                if let Some(value) = &output.value {
                    outputs.insert(output.name.clone(), value.clone());
                }
            }
            outputs.clone()
        };

        shared.cx.callbacks.emit(&ExecutionEvent::WorkflowFinished {
            execution_id,
            workflow: definition.name.clone(),
            status,
            duration_ms: run_start.elapsed().as_millis() as u64,
            error: failure.as_ref().map(|f| f.to_string()),
        });
        shared.save_checkpoint(status).await;
        tracing::info!(
            execution_id = %execution_id,
            workflow = definition.name.as_str(),
            status = ?status,
            duration_ms = run_start.elapsed().as_millis() as u64,
            "workflow execution finished"
        );

        Ok(ExecutionResult {
            execution_id,
            status,
            outputs,
            failure,
        })
    }
}

// ---------------------------------------------------------------------------
// Shared execution state
// ---------------------------------------------------------------------------

struct Shared<C: CheckpointStore> {
    cx: EngineContext,
    definition: Arc<WorkflowDefinition>,
    checkpoints: Arc<C>,
    /// Live-path record table; the checkpoint snapshot source.
    records: DashMap<String, PathRecord>,
    /// Outputs accumulated from terminated paths (last write wins).
    outputs: Mutex<VarMap>,
    /// First unrecovered failure.
    failure: Mutex<Option<ExecutionFailure>>,
}

impl<C: CheckpointStore> Shared<C> {
    fn publish(&self, path: &Path) {
        self.records.insert(path.id.clone(), path.record());
    }

    fn retire(&self, path_id: &str) {
        self.records.remove(path_id);
    }

    fn record_failure(&self, failure: ExecutionFailure) {
        let mut slot = self.failure.lock().unwrap();
        if slot.is_none() {
            *slot = Some(failure);
        }
    }

    /// Resolve declared outputs from a terminating path's final variables.
    fn merge_outputs(&self, state: &PathState) {
        let mut outputs = self.outputs.lock().unwrap();
        for output in &self.definition.outputs {
            if let Some(source) = &output.source
                && let Some(value) = state.variable(source)
            {
                outputs.insert(output.name.clone(), value);
            }
        }
    }

    fn snapshot(&self, status: ExecutionStatus) -> CheckpointRecord {
        let mut paths: Vec<PathRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        paths.sort_by(|a, b| a.id.cmp(&b.id));
        let failure = self.failure.lock().unwrap();
        CheckpointRecord {
            schema_version: SCHEMA_VERSION,
            execution_id: self.cx.execution_id,
            workflow_name: self.cx.workflow_name.clone(),
            status,
            outputs: self.outputs.lock().unwrap().clone(),
            error: failure.as_ref().map(|f| f.to_string()),
            paths,
        }
    }

    /// Persist a snapshot. Best-effort: failures are logged, never fatal.
    async fn save_checkpoint(&self, status: ExecutionStatus) {
        let record = self.snapshot(status);
        match encode_record(&record) {
            Ok(payload) => {
                if let Err(e) = self.checkpoints.save(self.cx.execution_id, &payload).await {
                    tracing::warn!(
                        execution_id = %self.cx.execution_id,
                        error = %e,
                        "checkpoint save failed"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    execution_id = %self.cx.execution_id,
                    error = %e,
                    "checkpoint encode failed"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Path task
// ---------------------------------------------------------------------------

/// Drive one path until it terminates or forks. Returns the children to
/// spawn (empty on termination).
async fn run_path<C: CheckpointStore + 'static>(
    shared: Arc<Shared<C>>,
    mut path: Path,
) -> Vec<Path> {
    loop {
        // Step boundary: observe cancellation before dispatching. The path
        // record is kept so a canceled execution can be resumed.
        if shared.cx.cancel.is_cancelled() {
            tracing::debug!(path_id = path.id.as_str(), "path stopping at cancel");
            return Vec::new();
        }

        let Some(step) = shared.definition.step(&path.current_step).cloned() else {
            shared.record_failure(ExecutionFailure {
                kind: ErrorKind::Validation,
                path_id: path.id.clone(),
                step: path.current_step.clone(),
                message: format!("unknown step '{}'", path.current_step),
            });
            shared.retire(&path.id);
            return Vec::new();
        };

        let outcome = evaluate_step(
            &shared.cx,
            &mut path,
            &step,
            shared.definition.default_edge_mode(),
        )
        .await;

        match outcome {
            Ok(StepOutcome::Advance(targets)) if targets.len() == 1 => {
                path.advance(targets.into_iter().next().expect("one target"));
                shared.publish(&path);
                shared.save_checkpoint(ExecutionStatus::Running).await;
            }
            Ok(StepOutcome::Advance(targets)) => {
                let children = path.fork(&targets);
                tracing::debug!(
                    path_id = path.id.as_str(),
                    children = children.len(),
                    "path forked"
                );
                shared.retire(&path.id);
                for child in &children {
                    shared.publish(child);
                }
                shared.save_checkpoint(ExecutionStatus::Running).await;
                return children;
            }
            Ok(StepOutcome::Caught(next)) => {
                path.advance(next);
                shared.publish(&path);
                shared.save_checkpoint(ExecutionStatus::Running).await;
            }
            Ok(StepOutcome::Finished) => {
                shared.merge_outputs(&path.state);
                shared.retire(&path.id);
                shared.save_checkpoint(ExecutionStatus::Running).await;
                tracing::debug!(path_id = path.id.as_str(), "path terminated");
                return Vec::new();
            }
            Err(failure) => {
                let canceled = failure.kind == ErrorKind::Canceled;
                tracing::debug!(
                    path_id = path.id.as_str(),
                    error = %failure,
                    "path failed"
                );
                shared.record_failure(failure);
                if !canceled {
                    // A canceled path keeps its record for resume; a failed
                    // one has terminated.
                    shared.retire(&path.id);
                }
                shared.save_checkpoint(ExecutionStatus::Running).await;
                return Vec::new();
            }
        }
    }
}
