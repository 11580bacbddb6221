//! Filesystem checkpoint store: one file per execution id.

use std::path::PathBuf;

use traverse_core::checkpoint::{CheckpointError, CheckpointStore};
use uuid::Uuid;

/// Stores each execution's latest payload as `<execution_id>.json` under a
/// directory. Writes go through a temp file and rename so readers never see
/// a torn payload.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CheckpointError::Store(e.to_string()))?;
        Ok(Self { dir })
    }

    fn payload_path(&self, execution_id: Uuid) -> PathBuf {
        self.dir.join(format!("{execution_id}.json"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, execution_id: Uuid, payload: &[u8]) -> Result<(), CheckpointError> {
        let path = self.payload_path(execution_id);
        // Unique temp name per save: concurrent paths checkpoint the same
        // execution and must not race each other's rename.
        let tmp = self
            .dir
            .join(format!("{execution_id}.{}.tmp", Uuid::now_v7()));
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|e| CheckpointError::Store(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CheckpointError::Store(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, execution_id: Uuid) -> Result<Option<Vec<u8>>, CheckpointError> {
        match tokio::fs::read(self.payload_path(execution_id)).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CheckpointError::Store(e.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Uuid>, CheckpointError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CheckpointError::Store(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CheckpointError::Store(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Ok(id) = stem.parse::<Uuid>()
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
