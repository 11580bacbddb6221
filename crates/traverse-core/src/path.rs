//! Path: a sequential cursor through the workflow graph.
//!
//! A path owns its `PathState` and advances one step per iteration. When the
//! edge matcher returns several targets the path is replaced by child paths,
//! each with a deep copy of the state and an id derived from the parent id
//! plus a branch index, so ids are stable across resume.

use traverse_types::execution::PathRecord;

use crate::state::PathState;

/// Id of the root path of every execution.
pub const ROOT_PATH_ID: &str = "main";

/// A running cursor through the workflow graph.
#[derive(Debug, Clone)]
pub struct Path {
    pub id: String,
    pub current_step: String,
    pub state: PathState,
    /// Retry attempt counter for the current step (0-based).
    pub attempt: u32,
    pub parent_id: Option<String>,
    pub branch_index: u32,
}

impl Path {
    /// The root path, created by the execution itself.
    pub fn root(start_step: String, state: PathState) -> Self {
        Self {
            id: ROOT_PATH_ID.to_string(),
            current_step: start_step,
            state,
            attempt: 0,
            parent_id: None,
            branch_index: 0,
        }
    }

    /// Move to the next step, resetting the attempt counter.
    pub fn advance(&mut self, next: String) {
        self.current_step = next;
        self.attempt = 0;
    }

    /// Replace this path with one child per target.
    ///
    /// Children are numbered in target order starting at 1; each inherits a
    /// deep copy of this path's state.
    pub fn fork(&self, targets: &[String]) -> Vec<Path> {
        targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let branch_index = (i + 1) as u32;
                Path {
                    id: format!("{}-{}", self.id, branch_index),
                    current_step: target.clone(),
                    state: self.state.clone(),
                    attempt: 0,
                    parent_id: Some(self.id.clone()),
                    branch_index,
                }
            })
            .collect()
    }

    /// Snapshot for checkpointing.
    pub fn record(&self) -> PathRecord {
        PathRecord {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            branch_index: self.branch_index,
            current_step: self.current_step.clone(),
            attempt: self.attempt,
            inputs: self.state.inputs(),
            variables: self.state.variables(),
        }
    }

    /// Rebuild a path from a checkpoint record.
    pub fn from_record(record: PathRecord) -> Self {
        Self {
            id: record.id,
            current_step: record.current_step,
            state: PathState::new(record.inputs, record.variables),
            attempt: record.attempt,
            parent_id: record.parent_id,
            branch_index: record.branch_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
