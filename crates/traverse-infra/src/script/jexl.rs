//! JEXL-backed expression engine for conditions, templates, and scripts.
//!
//! Wraps `jexl_eval::Evaluator` with a standard transform set. Scripts are a
//! statement layer over JEXL: statements split on newlines and `;`, each
//! either a bare expression (its value becomes the script result) or an
//! assignment `state.path = expr` / `state.path += expr` / `state.path -=
//! expr`. Assigning `null` deletes the key. `inputs` are read-only.
//!
//! Scripts get no I/O or clock access; the only surface is the globals
//! object and the transform set.
//!
//! **Security note:** state is always passed as a context object, NEVER
//! interpolated into expression strings.

use serde_json::{Value, json};
use traverse_core::expression::{ExpressionEngine, ExpressionError, ScriptOutcome};

// ---------------------------------------------------------------------------
// JexlEngine
// ---------------------------------------------------------------------------

/// JEXL expression evaluator with standard transforms pre-registered.
///
/// A fresh `jexl_eval::Evaluator` is built per evaluation; the evaluator
/// itself is not shareable across threads, but this wrapper is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JexlEngine;

impl JexlEngine {
    pub fn new() -> Self {
        Self
    }

    fn evaluator() -> jexl_eval::Evaluator<'static> {
        jexl_eval::Evaluator::new()
            // String transforms
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.trim()))
            })
            .with_transform("split", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let delimiter = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
                let parts: Vec<&str> = s.split(delimiter).collect();
                Ok(json!(parts))
            })
            // Boolean transforms
            .with_transform("not", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                Ok(json!(!traverse_core::expression::is_truthy(&val)))
            })
            // String search transforms
            .with_transform("contains", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let search = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.contains(search)))
            })
            .with_transform("startsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let prefix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.starts_with(prefix)))
            })
            .with_transform("endsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let suffix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.ends_with(suffix)))
            })
            // Length transform (strings, arrays, objects)
            .with_transform("length", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                let len = match &val {
                    Value::String(s) => s.len(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
    }
}

impl ExpressionEngine for JexlEngine {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }
        Self::evaluator()
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))
    }

    fn run_script(&self, source: &str, globals: &Value) -> Result<ScriptOutcome, ExpressionError> {
        if !globals.is_object() {
            return Err(ExpressionError::InvalidContext(
                "script globals must be a JSON object".to_string(),
            ));
        }

        let mut globals = globals.clone();
        let mut last = Value::Null;

        for statement in split_statements(source) {
            match parse_statement(&statement)? {
                Statement::Assign { path, expression } => {
                    if path.first().map(String::as_str) == Some("inputs") {
                        return Err(ExpressionError::InvalidStatement(format!(
                            "'{statement}': inputs are read-only"
                        )));
                    }
                    if path.first().map(String::as_str) != Some("state") || path.len() < 2 {
                        return Err(ExpressionError::InvalidStatement(format!(
                            "'{statement}': assignment target must be a state.* path"
                        )));
                    }
                    let value = self.evaluate(&expression, &globals)?;
                    assign(&mut globals, &path[1..], value, &statement)?;
                }
                Statement::Expr(expression) => {
                    last = self.evaluate(&expression, &globals)?;
                }
            }
        }

        Ok(ScriptOutcome {
            globals,
            value: last,
        })
    }
}

// ---------------------------------------------------------------------------
// Statement parsing
// ---------------------------------------------------------------------------

enum Statement {
    /// `state.path = <jexl expression>` (compound operators already folded
    /// into the expression).
    Assign {
        path: Vec<String>,
        expression: String,
    },
    /// A bare expression; its value becomes the script result.
    Expr(String),
}

/// Split a script into statements on newlines and `;`, honoring quotes and
/// skipping blanks and `#` comments.
fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_quote: Option<char> = None;

    for c in source.chars() {
        match in_quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    current.push(c);
                    in_quote = Some(c);
                }
                '\n' | ';' => {
                    statements.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .collect()
}

fn parse_statement(statement: &str) -> Result<Statement, ExpressionError> {
    let Some((idx, op)) = find_assignment(statement) else {
        return Ok(Statement::Expr(statement.to_string()));
    };

    let lhs = statement[..idx].trim();
    let rhs = statement[idx + op.len()..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return Err(ExpressionError::InvalidStatement(format!(
            "'{statement}': empty assignment side"
        )));
    }

    let path: Vec<String> = lhs.split('.').map(|s| s.trim().to_string()).collect();
    for segment in &path {
        if segment.is_empty()
            || !segment.chars().all(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(ExpressionError::InvalidStatement(format!(
                "'{statement}': invalid assignment target '{lhs}'"
            )));
        }
    }

    let expression = match op {
        AssignOp::Set => rhs.to_string(),
        AssignOp::Add => format!("({lhs}) + ({rhs})"),
        AssignOp::Sub => format!("({lhs}) - ({rhs})"),
    };
    Ok(Statement::Assign { path, expression })
}

#[derive(Clone, Copy)]
enum AssignOp {
    Set,
    Add,
    Sub,
}

impl AssignOp {
    fn len(self) -> usize {
        match self {
            AssignOp::Set => 1,
            AssignOp::Add | AssignOp::Sub => 2,
        }
    }
}

/// Find the top-level assignment operator, skipping `==`, `!=`, `<=`, `>=`
/// and quoted strings. Returns the byte offset where the operator starts.
fn find_assignment(statement: &str) -> Option<(usize, AssignOp)> {
    let bytes = statement.as_bytes();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match in_quote {
            Some(q) => {
                if c == q {
                    in_quote = None;
                }
            }
            None => match c {
                b'\'' | b'"' => in_quote = Some(c),
                b'=' => {
                    if bytes.get(i + 1) == Some(&b'=') {
                        i += 2;
                        continue;
                    }
                    let prev = if i > 0 { bytes[i - 1] } else { 0 };
                    match prev {
                        b'!' | b'<' | b'>' => {}
                        b'+' => return Some((i - 1, AssignOp::Add)),
                        b'-' => return Some((i - 1, AssignOp::Sub)),
                        _ => return Some((i, AssignOp::Set)),
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Write `value` at the dotted path under `state`, creating intermediate
/// objects. A null value deletes the key instead.
fn assign(
    globals: &mut Value,
    segments: &[String],
    value: Value,
    statement: &str,
) -> Result<(), ExpressionError> {
    let state = globals
        .get_mut("state")
        .ok_or_else(|| ExpressionError::InvalidContext("globals missing 'state'".to_string()))?;

    let mut current = state;
    for segment in &segments[..segments.len() - 1] {
        let map = current.as_object_mut().ok_or_else(|| {
            ExpressionError::InvalidStatement(format!(
                "'{statement}': '{segment}' is not an object"
            ))
        })?;
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Default::default()));
    }

    let leaf = &segments[segments.len() - 1];
    let map = current.as_object_mut().ok_or_else(|| {
        ExpressionError::InvalidStatement(format!(
            "'{statement}': assignment target parent is not an object"
        ))
    })?;
    if value.is_null() {
        map.remove(leaf);
    } else {
        map.insert(leaf.clone(), value);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
