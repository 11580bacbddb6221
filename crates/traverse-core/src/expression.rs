//! Expression-engine port and truthiness rules.
//!
//! The engine core never depends on a concrete evaluator; anything that can
//! evaluate an expression string against a JSON context and run a small
//! state-mutating script satisfies this port. The JEXL-backed implementation
//! lives in `traverse-infra`.
//!
//! Scripts must not be granted I/O or clock access by default; an
//! implementation may opt in explicitly.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced by expression evaluation, templating, and scripts.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("unterminated template expression in {0:?}")]
    UnterminatedTemplate(String),

    #[error("invalid expression context: {0}")]
    InvalidContext(String),

    #[error("invalid script statement: {0}")]
    InvalidStatement(String),
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Result of running a script: the (possibly mutated) globals object and the
/// value of the last bare expression statement, if any.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub globals: Value,
    pub value: Value,
}

/// Embeddable expression/script evaluator.
///
/// `evaluate` powers edge conditions and `${...}` template fragments.
/// `run_script` executes a free-form snippet against a globals object of the
/// shape `{"state": {...}, "inputs": {...}}`; the snippet may read and write
/// `state.x` paths (assigning `null` deletes the key) and must treat
/// `inputs` as read-only. The caller diffs the returned globals to derive
/// patches and to detect forbidden input mutation.
pub trait ExpressionEngine: Send + Sync {
    /// Evaluate a single expression against a JSON object context.
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError>;

    /// Run a script snippet against a globals object.
    fn run_script(&self, source: &str, globals: &Value) -> Result<ScriptOutcome, ExpressionError>;
}

// ---------------------------------------------------------------------------
// Truthiness
// ---------------------------------------------------------------------------

/// Coerce an expression result to a boolean.
///
/// Rules: booleans as-is; nonzero numbers true; non-empty strings true
/// except the case-insensitive literal `"false"`; non-empty arrays/objects
/// true; null and everything else false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
