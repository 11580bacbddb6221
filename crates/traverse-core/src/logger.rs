//! Activity logger port.
//!
//! One record per activity invocation. Implementations must be safe for
//! concurrent use by multiple paths; the engine does not serialize calls.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use traverse_types::workflow::VarMap;
use uuid::Uuid;

/// One activity invocation, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogRecord {
    pub execution_id: Uuid,
    pub activity: String,
    pub path_id: String,
    pub step: String,
    pub params: VarMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

/// Sink for activity invocation records.
pub trait ActivityLogger: Send + Sync {
    fn log(&self, record: &ActivityLogRecord);
}

/// Accepts and discards.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullActivityLogger;

impl ActivityLogger for NullActivityLogger {
    fn log(&self, _record: &ActivityLogRecord) {}
}
