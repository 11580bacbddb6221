//! `math.random`: random numbers.

use rand::Rng;
use serde_json::{Value, json};
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_types::workflow::VarMap;

/// With integer parameters `min` and `max` (inclusive), returns a uniform
/// integer in the range; with no parameters, a uniform float in `[0, 1)`.
pub struct RandomActivity;

impl Activity for RandomActivity {
    fn name(&self) -> &str {
        "math.random"
    }

    async fn execute(
        &self,
        _ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let min = params.get("min").and_then(Value::as_i64);
        let max = params.get("max").and_then(Value::as_i64);

        let value = match (min, max) {
            (Some(min), Some(max)) => {
                if min > max {
                    return Err(ActivityError::invalid(format!(
                        "min ({min}) must not exceed max ({max})"
                    )));
                }
                json!(rand::thread_rng().gen_range(min..=max))
            }
            (None, None) => json!(rand::thread_rng().r#gen::<f64>()),
            _ => {
                return Err(ActivityError::invalid(
                    "'min' and 'max' must be provided together",
                ));
            }
        };

        Ok(ActivityOutput::value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::JexlEngine;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;
    use traverse_core::logger::NullActivityLogger;
    use traverse_core::state::PathState;
    use uuid::Uuid;

    async fn run(params: VarMap) -> Result<ActivityOutput, ActivityError> {
        let cancel = CancellationToken::new();
        let state = PathState::new(HashMap::new(), HashMap::new());
        let engine = JexlEngine::new();
        let logger = NullActivityLogger;
        let ctx = ActivityContext {
            execution_id: Uuid::now_v7(),
            path_id: "main",
            step: "roll",
            cancel: &cancel,
            state: &state,
            engine: &engine,
            logger: &logger,
        };
        RandomActivity.execute(ctx, params).await
    }

    #[tokio::test]
    async fn ranged_values_stay_in_bounds() {
        for _ in 0..50 {
            let out = run(HashMap::from([
                ("min".to_string(), json!(1)),
                ("max".to_string(), json!(6)),
            ]))
            .await
            .unwrap();
            let n = out.value.as_i64().unwrap();
            assert!((1..=6).contains(&n), "out of range: {n}");
        }
    }

    #[tokio::test]
    async fn default_is_unit_float() {
        let out = run(HashMap::new()).await.unwrap();
        let f = out.value.as_f64().unwrap();
        assert!((0.0..1.0).contains(&f));
    }

    #[tokio::test]
    async fn inverted_range_is_invalid() {
        let err = run(HashMap::from([
            ("min".to_string(), json!(9)),
            ("max".to_string(), json!(1)),
        ]))
        .await
        .unwrap_err();
        assert_eq!(err.kind, traverse_types::error::ErrorKind::Validation);
    }
}
