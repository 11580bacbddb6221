//! Service wiring: registry, expression engine, logger, and timeout setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use traverse_core::expression::ExpressionEngine;
use traverse_core::logger::{ActivityLogger, NullActivityLogger};
use traverse_core::registry::ActivityRegistry;
use traverse_infra::FileActivityLogger;
use traverse_infra::activity::{WorkflowLibrary, builtin_registry, child_workflow_registry};
use traverse_infra::script::JexlEngine;

/// The shared JEXL engine handle.
pub fn expression_engine() -> Arc<dyn ExpressionEngine> {
    Arc::new(JexlEngine::new())
}

/// Build the activity registry.
///
/// With child workflows enabled, every sibling workflow file of
/// `workflow_file` is loaded into a library and `workflow.call` is wired in.
pub fn build_registry(
    workflow_file: &Path,
    enable_child_workflows: bool,
    engine: Arc<dyn ExpressionEngine>,
) -> anyhow::Result<Arc<ActivityRegistry>> {
    if !enable_child_workflows {
        return Ok(Arc::new(builtin_registry()));
    }

    let library = Arc::new(WorkflowLibrary::new());
    let dir = workflow_file.parent().unwrap_or(Path::new("."));
    for definition in discover_workflows(dir)? {
        tracing::debug!(child = definition.name.as_str(), "registered child workflow");
        library.insert(definition);
    }
    Ok(child_workflow_registry(builtin_registry, library, engine))
}

/// Load every parseable workflow file directly under `dir`. Files that fail
/// to parse are skipped with a warning; they may not be workflows at all.
fn discover_workflows(
    dir: &Path,
) -> anyhow::Result<Vec<traverse_types::workflow::WorkflowDefinition>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !path.is_file() || !is_yaml {
            continue;
        }
        match traverse_core::definition::load_workflow_file(&path) {
            Ok(definition) => found.push(definition),
            Err(_) => {
                tracing::warn!(?path, "skipping unparseable workflow file");
            }
        }
    }
    Ok(found)
}

/// Activity logger: filesystem-backed when a logs directory is given.
pub fn build_logger(logs_dir: Option<&PathBuf>) -> anyhow::Result<Arc<dyn ActivityLogger>> {
    match logs_dir {
        Some(dir) => {
            let logger = FileActivityLogger::new(dir)
                .with_context(|| format!("create logs directory {}", dir.display()))?;
            Ok(Arc::new(logger))
        }
        None => Ok(Arc::new(NullActivityLogger)),
    }
}

/// A cancellation token that fires at the deadline, if one is given.
pub fn cancellation_with_timeout(timeout_secs: Option<u64>) -> CancellationToken {
    let cancel = CancellationToken::new();
    if let Some(secs) = timeout_secs {
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!(timeout_secs = secs, "execution timeout reached, canceling");
            deadline.cancel();
        });
    }
    cancel
}
