//! Command handlers: run, resume, inputs, validate, list.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use comfy_table::{Cell, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use traverse_core::checkpoint::{CheckpointStore, decode_record, load_record};
use traverse_core::definition::load_workflow_file;
use traverse_core::executor::{ExecutionResult, WorkflowExecutor};
use traverse_infra::FileCheckpointStore;
use traverse_types::execution::ExecutionStatus;
use traverse_types::workflow::WorkflowDefinition;

use crate::inputs::parse_input_args;
use crate::wiring;

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub struct RunOptions {
    pub file: PathBuf,
    pub inputs: Vec<String>,
    pub logs_dir: Option<PathBuf>,
    pub checkpoints_dir: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub enable_child_workflows: bool,
}

pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let definition = load_definition(&opts.file)?;
    let provided = parse_input_args(&opts.inputs)?;

    let engine = wiring::expression_engine();
    let registry = wiring::build_registry(
        &opts.file,
        opts.enable_child_workflows,
        Arc::clone(&engine),
    )?;
    let logger = wiring::build_logger(opts.logs_dir.as_ref())?;
    let cancel = wiring::cancellation_with_timeout(opts.timeout);

    let executor = WorkflowExecutor::new(registry, engine).with_logger(logger);
    let result = match &opts.checkpoints_dir {
        Some(dir) => {
            let store = Arc::new(FileCheckpointStore::new(dir)?);
            executor
                .with_checkpoint_store(store)
                .execute(&definition, provided, cancel)
                .await?
        }
        None => executor.execute(&definition, provided, cancel).await?,
    };

    report(&definition, result)
}

// ---------------------------------------------------------------------------
// resume
// ---------------------------------------------------------------------------

pub struct ResumeOptions {
    pub file: PathBuf,
    pub execution_id: Uuid,
    pub checkpoints_dir: PathBuf,
    pub logs_dir: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub enable_child_workflows: bool,
}

pub async fn resume(opts: ResumeOptions) -> anyhow::Result<()> {
    let definition = load_definition(&opts.file)?;
    let store = Arc::new(FileCheckpointStore::new(&opts.checkpoints_dir)?);
    let record = load_record(store.as_ref(), opts.execution_id).await?;

    let engine = wiring::expression_engine();
    let registry = wiring::build_registry(
        &opts.file,
        opts.enable_child_workflows,
        Arc::clone(&engine),
    )?;
    let logger = wiring::build_logger(opts.logs_dir.as_ref())?;
    let cancel = wiring::cancellation_with_timeout(opts.timeout);

    let result = WorkflowExecutor::new(registry, engine)
        .with_logger(logger)
        .with_checkpoint_store(store)
        .resume(&definition, record, cancel)
        .await?;

    report(&definition, result)
}

// ---------------------------------------------------------------------------
// inputs / validate
// ---------------------------------------------------------------------------

pub fn show_inputs(file: &Path) -> anyhow::Result<()> {
    let definition = load_definition(file)?;
    if definition.inputs.is_empty() {
        println!("workflow '{}' declares no inputs", definition.name);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Input", "Type", "Required", "Default", "Description"]);
    for input in &definition.inputs {
        table.add_row(vec![
            Cell::new(&input.name),
            Cell::new(format!("{:?}", input.kind).to_lowercase()),
            Cell::new(if input.required && input.default.is_none() {
                "yes"
            } else {
                "no"
            }),
            Cell::new(
                input
                    .default
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(input.description.as_deref().unwrap_or_default()),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn validate(file: &Path) -> anyhow::Result<()> {
    let definition = load_definition(file)?;
    println!(
        "{} workflow '{}' is valid ({} steps)",
        style("ok").green(),
        definition.name,
        definition.steps.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

pub async fn list(checkpoints_dir: &Path) -> anyhow::Result<()> {
    let store = FileCheckpointStore::new(checkpoints_dir)?;
    let ids = store.list().await?;
    if ids.is_empty() {
        println!("no checkpointed executions");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Execution", "Workflow", "Status", "Live paths"]);
    for id in ids {
        let Some(payload) = store.load(id).await? else {
            continue;
        };
        match decode_record(&payload) {
            Ok(record) => {
                table.add_row(vec![
                    Cell::new(id),
                    Cell::new(&record.workflow_name),
                    Cell::new(status_label(record.status)),
                    Cell::new(record.paths.len()),
                ]);
            }
            Err(e) => {
                tracing::warn!(execution_id = %id, error = %e, "unreadable checkpoint");
            }
        }
    }
    println!("{table}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_definition(file: &Path) -> anyhow::Result<WorkflowDefinition> {
    load_workflow_file(file).with_context(|| format!("load workflow {}", file.display()))
}

fn status_label(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Canceled => "canceled",
    }
}

/// Print the run outcome. Completed runs print declared outputs and return
/// normally; failed and canceled runs exit 1.
fn report(definition: &WorkflowDefinition, result: ExecutionResult) -> anyhow::Result<()> {
    match result.status {
        ExecutionStatus::Completed => {
            println!(
                "{} '{}' completed (execution {})",
                style("ok").green(),
                definition.name,
                result.execution_id
            );
            if !definition.outputs.is_empty() {
                let mut table = Table::new();
                table
                    .load_preset(presets::UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["Output", "Value"]);
                for output in &definition.outputs {
                    let value = result
                        .outputs
                        .get(&output.name)
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    table.add_row(vec![Cell::new(&output.name), Cell::new(value)]);
                }
                println!("{table}");
            }
            Ok(())
        }
        ExecutionStatus::Canceled => {
            eprintln!(
                "{} '{}' canceled (execution {})",
                style("canceled").yellow(),
                definition.name,
                result.execution_id
            );
            std::process::exit(1);
        }
        _ => {
            match &result.failure {
                Some(failure) => eprintln!(
                    "{} '{}' failed: [{}] step '{}': {}",
                    style("error").red(),
                    definition.name,
                    failure.kind,
                    failure.step,
                    failure.message
                ),
                None => eprintln!(
                    "{} '{}' failed (execution {})",
                    style("error").red(),
                    definition.name,
                    result.execution_id
                ),
            }
            std::process::exit(1);
        }
    }
}
