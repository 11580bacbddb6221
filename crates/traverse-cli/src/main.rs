//! traverse CLI entry point.
//!
//! Binary name: `trav`
//!
//! Parses CLI arguments, initializes tracing, and dispatches to the command
//! handlers. Exit code 0 means the workflow completed; failed, canceled, and
//! invalid runs exit 1.

mod commands;
mod inputs;
mod wiring;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "trav", about = "Run workflow files with the traverse engine")]
struct Cli {
    /// Increase logging verbosity (-v: info, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file from its start step.
    Run {
        /// Path to the workflow YAML file.
        file: PathBuf,

        /// Workflow input as key=value; values are JSON-decoded with a
        /// plain-string fallback. Repeatable.
        #[arg(short = 'i', long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Directory for per-execution activity logs.
        #[arg(long, value_name = "DIR")]
        logs_dir: Option<PathBuf>,

        /// Directory for checkpoints; enables resume.
        #[arg(long, value_name = "DIR")]
        checkpoints_dir: Option<PathBuf>,

        /// Execution timeout in seconds; the run is canceled at the
        /// deadline.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Print the workflow's declared inputs and exit.
        #[arg(long)]
        show_inputs: bool,

        /// Allow `workflow.call` steps; sibling workflow files next to the
        /// main file become callable children.
        #[arg(long)]
        enable_child_workflows: bool,
    },

    /// Resume an interrupted execution from its checkpoint.
    Resume {
        /// Path to the workflow YAML file.
        file: PathBuf,

        /// Execution id to resume.
        execution_id: Uuid,

        /// Directory the execution was checkpointed to.
        #[arg(long, value_name = "DIR")]
        checkpoints_dir: PathBuf,

        /// Directory for per-execution activity logs.
        #[arg(long, value_name = "DIR")]
        logs_dir: Option<PathBuf>,

        /// Execution timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Allow `workflow.call` steps.
        #[arg(long)]
        enable_child_workflows: bool,
    },

    /// Print a workflow's declared inputs.
    Inputs {
        /// Path to the workflow YAML file.
        file: PathBuf,
    },

    /// Parse and validate a workflow file.
    Validate {
        /// Path to the workflow YAML file.
        file: PathBuf,
    },

    /// List checkpointed executions.
    List {
        /// Checkpoint directory to inspect.
        #[arg(long, value_name = "DIR")]
        checkpoints_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,traverse=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            file,
            inputs,
            logs_dir,
            checkpoints_dir,
            timeout,
            show_inputs,
            enable_child_workflows,
        } => {
            if show_inputs {
                return commands::show_inputs(&file);
            }
            commands::run(commands::RunOptions {
                file,
                inputs,
                logs_dir,
                checkpoints_dir,
                timeout,
                enable_child_workflows,
            })
            .await
        }

        Commands::Resume {
            file,
            execution_id,
            checkpoints_dir,
            logs_dir,
            timeout,
            enable_child_workflows,
        } => {
            commands::resume(commands::ResumeOptions {
                file,
                execution_id,
                checkpoints_dir,
                logs_dir,
                timeout,
                enable_child_workflows,
            })
            .await
        }

        Commands::Inputs { file } => commands::show_inputs(&file),

        Commands::Validate { file } => commands::validate(&file),

        Commands::List { checkpoints_dir } => commands::list(&checkpoints_dir).await,
    }
}
