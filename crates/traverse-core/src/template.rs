//! `${...}` template rendering for step parameters.
//!
//! A string that is exactly one `${expr}` resolves to the raw typed value of
//! the expression; any other string with embedded `${...}` fragments is
//! interpolated, stringifying each fragment. An unclosed `${` is a fatal
//! expression error. Non-string parameter values pass through untouched,
//! except that strings nested inside arrays and objects are rendered too.

use serde_json::Value;
use traverse_types::workflow::VarMap;

use crate::expression::{ExpressionEngine, ExpressionError};

/// Render a single parameter string against the `{inputs, state}` context.
pub fn render_value(
    input: &str,
    context: &Value,
    engine: &dyn ExpressionEngine,
) -> Result<Value, ExpressionError> {
    if !input.contains("${") {
        return Ok(Value::String(input.to_string()));
    }

    // Whole-value template: return the raw typed expression result.
    if let Some(expr) = whole_value_expression(input) {
        return engine.evaluate(expr, context);
    }

    let mut rendered = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        let Some(start) = rest.find("${") else {
            rendered.push_str(rest);
            break;
        };
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ExpressionError::UnterminatedTemplate(input.to_string()));
        };
        let value = engine.evaluate(after[..end].trim(), context)?;
        rendered.push_str(&stringify(&value));
        rest = &after[end + 1..];
    }
    Ok(Value::String(rendered))
}

/// If `input` is exactly `${ expr }` (modulo surrounding whitespace), return
/// the inner expression.
fn whole_value_expression(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if !trimmed.starts_with("${") || !trimmed.ends_with('}') {
        return None;
    }
    let inner = &trimmed[2..trimmed.len() - 1];
    // A second opening marker means this is interpolation, not a whole-value
    // template.
    if inner.contains("${") {
        return None;
    }
    Some(inner.trim())
}

/// Stringify a fragment value for interpolation: strings bare, scalars via
/// Display, composites as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Resolve every templated string in a parameter map, recursing into nested
/// arrays and objects.
pub fn resolve_params(
    params: &VarMap,
    context: &Value,
    engine: &dyn ExpressionEngine,
) -> Result<VarMap, ExpressionError> {
    params
        .iter()
        .map(|(key, value)| Ok((key.clone(), resolve_value(value, context, engine)?)))
        .collect()
}

fn resolve_value(
    value: &Value,
    context: &Value,
    engine: &dyn ExpressionEngine,
) -> Result<Value, ExpressionError> {
    match value {
        Value::String(s) => render_value(s, context, engine),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, context, engine))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve_value(v, context, engine)?)))
            .collect::<Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    /// Minimal evaluator for tests: resolves dotted paths into the context
    /// object, plus the literal `1 + 1`.
    struct PathEngine;

    impl ExpressionEngine for PathEngine {
        fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
            if expression == "1 + 1" {
                return Ok(json!(2));
            }
            let mut current = context;
            for part in expression.split('.') {
                current = current
                    .get(part.trim())
                    .ok_or_else(|| ExpressionError::EvalFailed(expression.to_string()))?;
            }
            Ok(current.clone())
        }

        fn run_script(
            &self,
            _source: &str,
            _globals: &Value,
        ) -> Result<crate::expression::ScriptOutcome, ExpressionError> {
            unreachable!("templates never run scripts")
        }
    }

    fn ctx() -> Value {
        json!({
            "inputs": {"who": "alice"},
            "state": {"count": 3, "flags": {"ready": true}, "items": [1, 2]},
        })
    }

    // -----------------------------------------------------------------------
    // Plain strings
    // -----------------------------------------------------------------------

    #[test]
    fn test_plain_string_passes_through() {
        let out = render_value("no templates here", &ctx(), &PathEngine).unwrap();
        assert_eq!(out, json!("no templates here"));
    }

    // -----------------------------------------------------------------------
    // Whole-value templates keep the raw type
    // -----------------------------------------------------------------------

    #[test]
    fn test_whole_value_template_returns_raw_value() {
        let out = render_value("${ state.count }", &ctx(), &PathEngine).unwrap();
        assert_eq!(out, json!(3));

        let out = render_value("${state.items}", &ctx(), &PathEngine).unwrap();
        assert_eq!(out, json!([1, 2]));

        let out = render_value("  ${ state.flags }  ", &ctx(), &PathEngine).unwrap();
        assert_eq!(out, json!({"ready": true}));
    }

    #[test]
    fn test_whole_value_template_with_arithmetic() {
        let out = render_value("${ 1 + 1 }", &ctx(), &PathEngine).unwrap();
        assert_eq!(out, json!(2));
    }

    // -----------------------------------------------------------------------
    // Interpolation stringifies fragments
    // -----------------------------------------------------------------------

    #[test]
    fn test_interpolation_stringifies() {
        let out = render_value(
            "hello ${ inputs.who }, count=${ state.count }",
            &ctx(),
            &PathEngine,
        )
        .unwrap();
        assert_eq!(out, json!("hello alice, count=3"));
    }

    #[test]
    fn test_interpolation_of_composites_uses_compact_json() {
        let out = render_value("items: ${ state.items }", &ctx(), &PathEngine).unwrap();
        assert_eq!(out, json!("items: [1,2]"));
    }

    #[test]
    fn test_two_templates_are_interpolation_not_whole_value() {
        let out = render_value("${ state.count }${ state.count }", &ctx(), &PathEngine).unwrap();
        assert_eq!(out, json!("33"));
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn test_unclosed_template_is_fatal() {
        let err = render_value("broken ${ state.count", &ctx(), &PathEngine).unwrap_err();
        assert!(matches!(err, ExpressionError::UnterminatedTemplate(_)));
    }

    #[test]
    fn test_evaluation_error_propagates() {
        let err = render_value("${ state.missing }", &ctx(), &PathEngine).unwrap_err();
        assert!(matches!(err, ExpressionError::EvalFailed(_)));
    }

    // -----------------------------------------------------------------------
    // Parameter map resolution
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolve_params_mixed_types() {
        let params: VarMap = HashMap::from([
            ("greeting".to_string(), json!("hi ${ inputs.who }")),
            ("count".to_string(), json!("${ state.count }")),
            ("limit".to_string(), json!(10)),
            ("flag".to_string(), json!(true)),
        ]);
        let resolved = resolve_params(&params, &ctx(), &PathEngine).unwrap();
        assert_eq!(resolved["greeting"], json!("hi alice"));
        assert_eq!(resolved["count"], json!(3));
        assert_eq!(resolved["limit"], json!(10));
        assert_eq!(resolved["flag"], json!(true));
    }

    #[test]
    fn test_resolve_params_recurses_into_nested_values() {
        let params: VarMap = HashMap::from([(
            "request".to_string(),
            json!({
                "headers": {"X-Who": "${ inputs.who }"},
                "tags": ["${ state.count }", "static"],
            }),
        )]);
        let resolved = resolve_params(&params, &ctx(), &PathEngine).unwrap();
        assert_eq!(resolved["request"]["headers"]["X-Who"], json!("alice"));
        assert_eq!(resolved["request"]["tags"], json!([3, "static"]));
    }
}
