//! Lifecycle events emitted by the engine's callback chain.
//!
//! Six events bracket the three execution scopes: workflow, step, and
//! activity. Events for a single path are ordered; events from sibling
//! paths interleave arbitrarily.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::execution::ExecutionStatus;
use crate::workflow::VarMap;

/// A lifecycle event carrying the identifying context of its scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// Emitted once, before the first path is dispatched.
    WorkflowStarted {
        execution_id: Uuid,
        workflow: String,
        at: DateTime<Utc>,
    },
    /// Emitted once, after every path has terminated.
    WorkflowFinished {
        execution_id: Uuid,
        workflow: String,
        status: ExecutionStatus,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Emitted before a step evaluation begins (attempt 0 only).
    StepStarted {
        execution_id: Uuid,
        workflow: String,
        path_id: String,
        step: String,
    },
    /// Emitted when a step evaluation ends, successfully or not.
    StepFinished {
        execution_id: Uuid,
        workflow: String,
        path_id: String,
        step: String,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Emitted before each activity invocation, with resolved parameters.
    ActivityStarted {
        execution_id: Uuid,
        workflow: String,
        path_id: String,
        step: String,
        activity: String,
        params: VarMap,
    },
    /// Emitted after each activity invocation.
    ActivityFinished {
        execution_id: Uuid,
        workflow: String,
        path_id: String,
        step: String,
        activity: String,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ExecutionEvent {
    /// The execution this event belongs to.
    pub fn execution_id(&self) -> Uuid {
        match self {
            ExecutionEvent::WorkflowStarted { execution_id, .. }
            | ExecutionEvent::WorkflowFinished { execution_id, .. }
            | ExecutionEvent::StepStarted { execution_id, .. }
            | ExecutionEvent::StepFinished { execution_id, .. }
            | ExecutionEvent::ActivityStarted { execution_id, .. }
            | ExecutionEvent::ActivityFinished { execution_id, .. } => *execution_id,
        }
    }

    /// The path id, for step- and activity-scoped events.
    pub fn path_id(&self) -> Option<&str> {
        match self {
            ExecutionEvent::StepStarted { path_id, .. }
            | ExecutionEvent::StepFinished { path_id, .. }
            | ExecutionEvent::ActivityStarted { path_id, .. }
            | ExecutionEvent::ActivityFinished { path_id, .. } => Some(path_id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_event_serde_tagging() {
        let event = ExecutionEvent::ActivityStarted {
            execution_id: Uuid::now_v7(),
            workflow: "wf".to_string(),
            path_id: "main".to_string(),
            step: "fetch".to_string(),
            activity: "http.request".to_string(),
            params: HashMap::from([("url".to_string(), json!("https://example.com"))]),
        };
        let json_str = serde_json::to_string(&event).unwrap();
        assert!(json_str.contains("\"type\":\"activity_started\""));
        let parsed: ExecutionEvent = serde_json::from_str(&json_str).unwrap();
        assert!(matches!(parsed, ExecutionEvent::ActivityStarted { .. }));
    }

    #[test]
    fn test_event_accessors() {
        let id = Uuid::now_v7();
        let event = ExecutionEvent::StepFinished {
            execution_id: id,
            workflow: "wf".to_string(),
            path_id: "main-2".to_string(),
            step: "fetch".to_string(),
            duration_ms: 12,
            error: None,
        };
        assert_eq!(event.execution_id(), id);
        assert_eq!(event.path_id(), Some("main-2"));

        let started = ExecutionEvent::WorkflowStarted {
            execution_id: id,
            workflow: "wf".to_string(),
            at: Utc::now(),
        };
        assert_eq!(started.path_id(), None);
    }
}
