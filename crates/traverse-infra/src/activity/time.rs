//! `time.sleep`: cancellation-aware delay.

use std::time::Duration;

use serde_json::json;
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_types::workflow::VarMap;

use super::optional_u64;

/// Parameters: `duration_ms`, or `seconds` (either, not both required; no
/// parameter means no delay). Wakes promptly on cancellation. Result:
/// `{slept_ms}`.
pub struct SleepActivity;

impl Activity for SleepActivity {
    fn name(&self) -> &str {
        "time.sleep"
    }

    async fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let duration_ms = optional_u64(&params, "duration_ms")
            .or_else(|| optional_u64(&params, "seconds").map(|s| s * 1000))
            .unwrap_or(0);

        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(ActivityError::canceled("sleep canceled"));
            }
            _ = tokio::time::sleep(Duration::from_millis(duration_ms)) => {}
        }

        Ok(ActivityOutput::value(json!({ "slept_ms": duration_ms })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::JexlEngine;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Instant;
    use tokio_util::sync::CancellationToken;
    use traverse_core::logger::NullActivityLogger;
    use traverse_core::state::PathState;
    use uuid::Uuid;

    #[tokio::test]
    async fn cancellation_wakes_the_sleep_promptly() {
        let cancel = CancellationToken::new();
        let state = PathState::new(HashMap::new(), HashMap::new());
        let engine = JexlEngine::new();
        let logger = NullActivityLogger;
        let ctx = ActivityContext {
            execution_id: Uuid::now_v7(),
            path_id: "main",
            step: "nap",
            cancel: &cancel,
            state: &state,
            engine: &engine,
            logger: &logger,
        };

        let canceler = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceler.cancel();
        });

        let started = Instant::now();
        let err = SleepActivity
            .execute(
                ctx,
                HashMap::from([("duration_ms".to_string(), json!(10_000))]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, traverse_types::error::ErrorKind::Canceled);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
