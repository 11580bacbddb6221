//! Built-in `script` activity: state mutation through the expression engine.
//!
//! Snapshots the path's variables, exposes `{state, inputs}` to the script,
//! and diffs the pre- and post-script snapshots into a patch batch applied
//! by the step evaluator. Mutating `inputs` is forbidden and fails the
//! activity with a validation error.

use serde_json::Value;
use traverse_types::workflow::VarMap;

use crate::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use crate::state::diff_variables;

/// The `script` activity. Takes a single required string parameter
/// `source`; returns the value of the script's last bare expression
/// statement (null when there is none) plus the derived patch batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptActivity;

impl Activity for ScriptActivity {
    fn name(&self) -> &str {
        "script"
    }

    async fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let source = params
            .get("source")
            .and_then(Value::as_str)
            .ok_or_else(|| ActivityError::invalid("script requires a string 'source' parameter"))?;

        let before_inputs = ctx.state.inputs_value();
        let before_vars = ctx.state.variables();
        let globals = serde_json::json!({
            "state": ctx.state.variables_value(),
            "inputs": before_inputs,
        });

        let outcome = ctx
            .engine
            .run_script(source, &globals)
            .map_err(|e| ActivityError::expression(e.to_string()))?;

        let after_inputs = outcome
            .globals
            .get("inputs")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));
        if after_inputs != before_inputs {
            return Err(ActivityError::invalid("scripts may not modify inputs"));
        }

        let after_vars: VarMap = match outcome.globals.get("state") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => {
                return Err(ActivityError::expression(
                    "script left 'state' as a non-object value",
                ));
            }
        };

        let patches = diff_variables(&before_vars, &after_vars);
        Ok(ActivityOutput::with_patches(outcome.value, patches))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
