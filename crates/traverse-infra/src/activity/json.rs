//! `json.parse` / `json.stringify`: text <-> value conversion.

use serde_json::Value;
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_types::workflow::VarMap;

use super::{optional_bool, required_str};

/// Parameters: `text` (required). Result: the parsed value.
pub struct JsonParseActivity;

impl Activity for JsonParseActivity {
    fn name(&self) -> &str {
        "json.parse"
    }

    async fn execute(
        &self,
        _ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let text = required_str(&params, "text")?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ActivityError::failed(format!("invalid JSON: {e}")))?;
        Ok(ActivityOutput::value(value))
    }
}

/// Parameters: `value` (required, any JSON), `pretty` (default false).
/// Result: the serialized string.
pub struct JsonStringifyActivity;

impl Activity for JsonStringifyActivity {
    fn name(&self) -> &str {
        "json.stringify"
    }

    async fn execute(
        &self,
        _ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let value = params
            .get("value")
            .ok_or_else(|| ActivityError::invalid("missing parameter 'value'"))?;
        let text = if optional_bool(&params, "pretty") {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| ActivityError::failed(e.to_string()))?;
        Ok(ActivityOutput::value(Value::String(text)))
    }
}
