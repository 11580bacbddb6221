//! Activity registry: name -> handler lookup, read-only after construction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use traverse_types::workflow::VarMap;

use crate::activity::{
    Activity, ActivityContext, ActivityError, ActivityOutput, BoxActivity, FnActivity,
};

/// Name -> activity lookup table.
///
/// Built once per execution wiring and shared read-only across paths.
#[derive(Default)]
pub struct ActivityRegistry {
    activities: HashMap<String, Arc<BoxActivity>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a concrete activity under its own name.
    pub fn register<T: Activity + 'static>(&mut self, activity: T) {
        let boxed = BoxActivity::new(activity);
        self.activities.insert(boxed.name().to_string(), Arc::new(boxed));
    }

    /// Register a closure under an explicit name. The closure reads what it
    /// needs from the context synchronously and returns an owned future.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(ActivityContext<'_>, VarMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActivityOutput, ActivityError>> + Send + 'static,
    {
        self.register(FnActivity::new(name, handler));
    }

    /// Register a typed handler: the free-form parameter map is decoded into
    /// `P` via serde before the handler runs. A decode failure is a
    /// validation error (never retried).
    pub fn register_typed<P, F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(ActivityContext<'_>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActivityOutput, ActivityError>> + Send + 'static,
    {
        let name = name.into();
        let decode_name = name.clone();
        self.register_fn(name, move |ctx, params: VarMap| {
            let object = Value::Object(params.into_iter().collect());
            let decoded = serde_json::from_value::<P>(object)
                .map_err(|e| format!("invalid parameters for '{decode_name}': {e}"));
            let fut = decoded.map(|typed| handler(ctx, typed));
            async move {
                match fut {
                    Ok(fut) => fut.await,
                    Err(message) => Err(ActivityError::invalid(message)),
                }
            }
        });
    }

    /// Look up an activity by name.
    pub fn get(&self, name: &str) -> Option<Arc<BoxActivity>> {
        self.activities.get(name).cloned()
    }

    /// Registered activity names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.activities.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionEngine, ExpressionError, ScriptOutcome};
    use crate::logger::NullActivityLogger;
    use crate::state::PathState;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    struct NoEngine;

    impl ExpressionEngine for NoEngine {
        fn evaluate(&self, _: &str, _: &Value) -> Result<Value, ExpressionError> {
            Ok(Value::Null)
        }

        fn run_script(&self, _: &str, _: &Value) -> Result<ScriptOutcome, ExpressionError> {
            Ok(ScriptOutcome {
                globals: Value::Null,
                value: Value::Null,
            })
        }
    }

    async fn invoke(
        registry: &ActivityRegistry,
        name: &str,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let cancel = CancellationToken::new();
        let state = PathState::new(HashMap::new(), HashMap::new());
        let engine = NoEngine;
        let logger = NullActivityLogger;
        let ctx = ActivityContext {
            execution_id: Uuid::now_v7(),
            path_id: "main",
            step: "test",
            cancel: &cancel,
            state: &state,
            engine: &engine,
            logger: &logger,
        };
        registry.get(name).expect("registered").execute(ctx, params).await
    }

    #[tokio::test]
    async fn register_fn_and_lookup() {
        let mut registry = ActivityRegistry::new();
        registry.register_fn("echo", |_ctx, params: VarMap| async move {
            Ok(ActivityOutput::value(
                params.get("message").cloned().unwrap_or(Value::Null),
            ))
        });

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());

        let out = invoke(
            &registry,
            "echo",
            HashMap::from([("message".to_string(), json!("hello"))]),
        )
        .await
        .unwrap();
        assert_eq!(out.value, json!("hello"));
    }

    #[tokio::test]
    async fn register_typed_decodes_params() {
        #[derive(Deserialize)]
        struct AddParams {
            a: i64,
            b: i64,
        }

        let mut registry = ActivityRegistry::new();
        registry.register_typed("add", |_ctx, p: AddParams| async move {
            Ok(ActivityOutput::value(json!(p.a + p.b)))
        });

        let out = invoke(
            &registry,
            "add",
            HashMap::from([("a".to_string(), json!(2)), ("b".to_string(), json!(3))]),
        )
        .await
        .unwrap();
        assert_eq!(out.value, json!(5));
    }

    #[tokio::test]
    async fn register_typed_rejects_bad_params_as_validation() {
        #[derive(Deserialize)]
        struct AddParams {
            #[allow(dead_code)]
            a: i64,
        }

        let mut registry = ActivityRegistry::new();
        registry.register_typed("add", |_ctx, _p: AddParams| async move {
            Ok(ActivityOutput::value(Value::Null))
        });

        let err = invoke(
            &registry,
            "add",
            HashMap::from([("a".to_string(), json!("not a number"))]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, traverse_types::error::ErrorKind::Validation);
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ActivityRegistry::new();
        registry.register_fn("zeta", |_ctx, _p: VarMap| async {
            Ok(ActivityOutput::default())
        });
        registry.register_fn("alpha", |_ctx, _p: VarMap| async {
            Ok(ActivityOutput::default())
        });
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        assert_eq!(registry.len(), 2);
    }
}
