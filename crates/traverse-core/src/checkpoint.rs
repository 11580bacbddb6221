//! Checkpoint store port and payload encoding.
//!
//! The engine serializes a `CheckpointRecord` snapshot after every step
//! boundary; stores treat the payload as opaque bytes. Saves are
//! best-effort from the engine's perspective: a write failure is logged and
//! never fails the run.

use std::future::Future;

use traverse_types::execution::{CheckpointRecord, SCHEMA_VERSION};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying storage operation failed.
    #[error("checkpoint store error: {0}")]
    Store(String),

    /// Payload could not be encoded or decoded.
    #[error("checkpoint serialization error: {0}")]
    Serialization(String),

    /// Payload was written by an incompatible engine.
    #[error("unsupported checkpoint schema version {0}")]
    UnsupportedVersion(u32),

    /// No checkpoint exists for the requested execution.
    #[error("no checkpoint found for execution {0}")]
    NotFound(Uuid),
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Opaque checkpoint payload storage, keyed by execution id.
///
/// Implementations must be safe for concurrent use by multiple paths.
pub trait CheckpointStore: Send + Sync {
    /// Persist the latest payload for an execution, replacing any previous
    /// one.
    fn save(
        &self,
        execution_id: Uuid,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), CheckpointError>> + Send;

    /// Load the latest payload for an execution, if any.
    fn load(
        &self,
        execution_id: Uuid,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, CheckpointError>> + Send;

    /// List execution ids with stored payloads.
    fn list(&self) -> impl Future<Output = Result<Vec<Uuid>, CheckpointError>> + Send;
}

/// Accepts and discards; `load` finds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCheckpointStore;

impl CheckpointStore for NullCheckpointStore {
    async fn save(&self, _execution_id: Uuid, _payload: &[u8]) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn load(&self, _execution_id: Uuid) -> Result<Option<Vec<u8>>, CheckpointError> {
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<Uuid>, CheckpointError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Payload encoding
// ---------------------------------------------------------------------------

/// Encode a checkpoint record to its payload bytes.
pub fn encode_record(record: &CheckpointRecord) -> Result<Vec<u8>, CheckpointError> {
    serde_json::to_vec(record).map_err(|e| CheckpointError::Serialization(e.to_string()))
}

/// Decode a payload back into a checkpoint record, verifying the schema
/// version.
pub fn decode_record(payload: &[u8]) -> Result<CheckpointRecord, CheckpointError> {
    let record: CheckpointRecord =
        serde_json::from_slice(payload).map_err(|e| CheckpointError::Serialization(e.to_string()))?;
    if record.schema_version != SCHEMA_VERSION {
        return Err(CheckpointError::UnsupportedVersion(record.schema_version));
    }
    Ok(record)
}

/// Load and decode the checkpoint for an execution, failing if absent.
pub async fn load_record<C: CheckpointStore>(
    store: &C,
    execution_id: Uuid,
) -> Result<CheckpointRecord, CheckpointError> {
    let payload = store
        .load(execution_id)
        .await?
        .ok_or(CheckpointError::NotFound(execution_id))?;
    decode_record(&payload)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
