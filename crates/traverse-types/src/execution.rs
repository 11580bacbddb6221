//! Execution status and checkpoint record types.
//!
//! A checkpoint payload is the serialized `CheckpointRecord`: a
//! self-describing snapshot of an execution at a step boundary, sufficient
//! to resume it in a fresh process. The record format must round-trip;
//! `SCHEMA_VERSION` guards against reading payloads written by an
//! incompatible engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::VarMap;

/// Current checkpoint payload schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl ExecutionStatus {
    /// Whether the execution has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Canceled
        )
    }
}

// ---------------------------------------------------------------------------
// Checkpoint records
// ---------------------------------------------------------------------------

/// Snapshot of one live path at a step boundary.
///
/// `current_step` is the step the path will execute next; `attempt` is the
/// retry attempt counter for that step as of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    /// Path id (`main`, `main-1`, `main-1-2`, ...). Stable across resume.
    pub id: String,
    /// Id of the path this one was forked from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// 1-based index among the siblings created by the same fork.
    #[serde(default)]
    pub branch_index: u32,
    /// Name of the step to execute next.
    pub current_step: String,
    /// Retry attempt counter for the current step.
    #[serde(default)]
    pub attempt: u32,
    /// Resolved workflow inputs (immutable for the path's lifetime).
    #[serde(default)]
    pub inputs: VarMap,
    /// Path-local state variables.
    #[serde(default)]
    pub variables: VarMap,
}

/// Self-describing execution snapshot persisted after every step boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Payload schema version (`SCHEMA_VERSION`).
    pub schema_version: u32,
    /// Execution id the snapshot belongs to.
    pub execution_id: Uuid,
    /// Name of the workflow being executed.
    pub workflow_name: String,
    /// Execution status at snapshot time.
    pub status: ExecutionStatus,
    /// Outputs accumulated from terminated paths so far.
    #[serde(default)]
    pub outputs: VarMap,
    /// Failure message when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every live path's position and state.
    #[serde(default)]
    pub paths: Vec<PathRecord>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
