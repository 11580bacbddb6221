//! Edge matching: select the next step(s) after a successful step.
//!
//! Edges are evaluated in declared order against the path's `{inputs,
//! state}` snapshot. Under `First` the result has at most one target; under
//! `All` every matching edge contributes one, and a multi-target result
//! forks the path. A condition evaluation failure is a fatal expression
//! error for the step.

use serde_json::Value;
use traverse_types::workflow::{EdgeMode, StepDefinition};

use crate::expression::{ExpressionEngine, ExpressionError, is_truthy};

/// Evaluate a step's outbound edges and return the matching targets in
/// declared order.
pub fn match_edges(
    step: &StepDefinition,
    mode: EdgeMode,
    context: &Value,
    engine: &dyn ExpressionEngine,
) -> Result<Vec<String>, ExpressionError> {
    let mut targets = Vec::new();
    for edge in &step.edges {
        let matched = if edge.is_unconditional() {
            true
        } else {
            let when = edge.when.as_deref().unwrap_or_default();
            let value = engine.evaluate(when, context)?;
            is_truthy(&value)
        };
        if matched {
            targets.push(edge.to.clone());
            if mode == EdgeMode::First {
                break;
            }
        }
    }
    Ok(targets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
