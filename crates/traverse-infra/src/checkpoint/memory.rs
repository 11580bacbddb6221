//! In-memory checkpoint store.

use dashmap::DashMap;
use traverse_core::checkpoint::{CheckpointError, CheckpointStore};
use uuid::Uuid;

/// Keeps the latest payload per execution in a concurrent map. Intended for
/// tests and short-lived embedded executions.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    payloads: DashMap<Uuid, Vec<u8>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, execution_id: Uuid, payload: &[u8]) -> Result<(), CheckpointError> {
        self.payloads.insert(execution_id, payload.to_vec());
        Ok(())
    }

    async fn load(&self, execution_id: Uuid) -> Result<Option<Vec<u8>>, CheckpointError> {
        Ok(self.payloads.get(&execution_id).map(|p| p.clone()))
    }

    async fn list(&self) -> Result<Vec<Uuid>, CheckpointError> {
        let mut ids: Vec<Uuid> = self.payloads.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        Ok(ids)
    }
}
