//! Filesystem activity logger: append-only JSONL per execution.

use std::io::Write;
use std::path::PathBuf;

use traverse_core::logger::{ActivityLogRecord, ActivityLogger};

/// Appends one JSON line per activity invocation to
/// `<logs_dir>/<execution_id>.jsonl`.
///
/// Appends are single `write_all` calls on files opened in append mode, so
/// concurrent paths never interleave within a line. Log failures are
/// reported via tracing and otherwise swallowed; logging never fails a run.
#[derive(Debug, Clone)]
pub struct FileActivityLogger {
    dir: PathBuf,
}

impl FileActivityLogger {
    /// Create a logger rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn append(&self, record: &ActivityLogRecord) -> std::io::Result<()> {
        let path = self.dir.join(format!("{}.jsonl", record.execution_id));
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(&line)
    }
}

impl ActivityLogger for FileActivityLogger {
    fn log(&self, record: &ActivityLogRecord) {
        if let Err(e) = self.append(record) {
            tracing::warn!(
                execution_id = %record.execution_id,
                error = %e,
                "activity log append failed"
            );
        }
    }
}
