//! `file.read` / `file.write`: filesystem access.

use serde_json::{Value, json};
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_types::workflow::VarMap;

use super::{optional_bool, required_str};

/// Parameters: `path` (required). Result: the file contents as a string.
pub struct FileReadActivity;

impl Activity for FileReadActivity {
    fn name(&self) -> &str {
        "file.read"
    }

    async fn execute(
        &self,
        _ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let path = required_str(&params, "path")?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ActivityError::failed(format!("read '{path}': {e}")))?;
        Ok(ActivityOutput::value(Value::String(content)))
    }
}

/// Parameters: `path` (required), `content` (string written raw, any other
/// value written as pretty JSON), `append` (default false). Parent
/// directories are created. Result: `{path, bytes}`.
pub struct FileWriteActivity;

impl Activity for FileWriteActivity {
    fn name(&self) -> &str {
        "file.write"
    }

    async fn execute(
        &self,
        _ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let path = required_str(&params, "path")?;
        let content = match params.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(value) => serde_json::to_string_pretty(value)
                .map_err(|e| ActivityError::failed(e.to_string()))?,
            None => String::new(),
        };

        if let Some(parent) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ActivityError::failed(format!("create '{}': {e}", parent.display())))?;
        }

        if optional_bool(&params, "append") {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(|e| ActivityError::failed(format!("open '{path}': {e}")))?;
            file.write_all(content.as_bytes())
                .await
                .map_err(|e| ActivityError::failed(format!("append '{path}': {e}")))?;
        } else {
            tokio::fs::write(path, &content)
                .await
                .map_err(|e| ActivityError::failed(format!("write '{path}': {e}")))?;
        }

        Ok(ActivityOutput::value(json!({
            "path": path,
            "bytes": content.len(),
        })))
    }
}
