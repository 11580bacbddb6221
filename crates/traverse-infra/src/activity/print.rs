//! `io.print`: write a message to stdout.

use serde_json::Value;
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_types::workflow::VarMap;

/// Parameters: `message` (any value; strings print bare, other values as
/// compact JSON). Returns the message so it can be stored.
pub struct PrintActivity;

impl Activity for PrintActivity {
    fn name(&self) -> &str {
        "io.print"
    }

    async fn execute(
        &self,
        _ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let message = params.get("message").cloned().unwrap_or(Value::Null);
        match &message {
            Value::String(s) => println!("{s}"),
            other => println!(
                "{}",
                serde_json::to_string(other).map_err(|e| ActivityError::failed(e.to_string()))?
            ),
        }
        Ok(ActivityOutput::value(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::JexlEngine;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;
    use traverse_core::logger::NullActivityLogger;
    use traverse_core::state::PathState;
    use uuid::Uuid;

    #[tokio::test]
    async fn returns_the_message() {
        let cancel = CancellationToken::new();
        let state = PathState::new(HashMap::new(), HashMap::new());
        let engine = JexlEngine::new();
        let logger = NullActivityLogger;
        let ctx = ActivityContext {
            execution_id: Uuid::now_v7(),
            path_id: "main",
            step: "announce",
            cancel: &cancel,
            state: &state,
            engine: &engine,
            logger: &logger,
        };
        let out = PrintActivity
            .execute(
                ctx,
                HashMap::from([("message".to_string(), json!({"n": 1}))]),
            )
            .await
            .unwrap();
        assert_eq!(out.value, json!({"n": 1}));
    }
}
