//! Path-local state: the mutable variable store owned by a single path.
//!
//! `PathState` holds the resolved workflow inputs (read-only for the path's
//! lifetime) and the state variables the path mutates as it advances.
//! Mutations are never visible to sibling paths; forking deep-copies the
//! whole store. Bulk mutations arrive as `Patch` batches produced by
//! diffing a pre-script snapshot against a post-script snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use traverse_types::workflow::VarMap;

use crate::definition::WorkflowError;

// ---------------------------------------------------------------------------
// PathState
// ---------------------------------------------------------------------------

/// Mutable state owned by exactly one path.
///
/// Accessors return defensive copies; the only mutation entry points are
/// `set_variable` and `apply_patches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathState {
    inputs: VarMap,
    variables: VarMap,
}

impl PathState {
    /// Create a state store from resolved inputs and initial variables.
    pub fn new(inputs: VarMap, variables: VarMap) -> Self {
        Self { inputs, variables }
    }

    /// Copy of the resolved inputs.
    pub fn inputs(&self) -> VarMap {
        self.inputs.clone()
    }

    /// Copy of the current variables.
    pub fn variables(&self) -> VarMap {
        self.variables.clone()
    }

    /// Copy of a single variable, if set.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    /// Write one variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Apply a patch batch: set patches insert/overwrite, delete patches
    /// remove.
    pub fn apply_patches(&mut self, patches: &[Patch]) {
        for patch in patches {
            match &patch.value {
                Some(value) => {
                    self.variables.insert(patch.name.clone(), value.clone());
                }
                None => {
                    self.variables.remove(&patch.name);
                }
            }
        }
    }

    /// The inputs as a JSON object value.
    pub fn inputs_value(&self) -> Value {
        Value::Object(self.inputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// The variables as a JSON object value.
    pub fn variables_value(&self) -> Value {
        Value::Object(
            self.variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Build the `{inputs, state}` object that expressions and templates
    /// evaluate against.
    pub fn to_expression_context(&self) -> Value {
        serde_json::json!({
            "inputs": self.inputs_value(),
            "state": self.variables_value(),
        })
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// An atomic state mutation: set a variable (`value: Some`) or delete it
/// (`value: None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub name: String,
    pub value: Option<Value>,
}

impl Patch {
    /// A set patch.
    pub fn set(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }

    /// A delete patch.
    pub fn delete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Diff two variable snapshots into a patch batch.
///
/// For each key: present in both with a changed value, or only in
/// `modified`, yields a set patch; present only in `original` yields a
/// delete patch. Comparison is deep value equality. Patches are sorted by
/// name so the batch is deterministic.
pub fn diff_variables(original: &VarMap, modified: &VarMap) -> Vec<Patch> {
    let mut patches = Vec::new();

    for (key, new_value) in modified {
        match original.get(key) {
            Some(old_value) if old_value == new_value => {}
            _ => patches.push(Patch::set(key.clone(), new_value.clone())),
        }
    }

    for key in original.keys() {
        if !modified.contains_key(key) {
            patches.push(Patch::delete(key.clone()));
        }
    }

    patches.sort_by(|a, b| a.name.cmp(&b.name));
    patches
}

// ---------------------------------------------------------------------------
// Store targets
// ---------------------------------------------------------------------------

/// Parsed `store` target of a step.
///
/// Accepted spellings: `state.x` or bare `x`, both meaning "write variable
/// `x`". Writing to `inputs.*` is rejected at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Variable(String),
}

impl StoreTarget {
    /// Parse a store target string.
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WorkflowError::ValidationError(
                "store target must not be empty".to_string(),
            ));
        }
        if trimmed == "inputs" || trimmed.starts_with("inputs.") {
            return Err(WorkflowError::ValidationError(format!(
                "store target '{trimmed}' writes to inputs, which are read-only"
            )));
        }
        let name = trimmed.strip_prefix("state.").unwrap_or(trimmed);
        if name.is_empty() || name == "state" {
            return Err(WorkflowError::ValidationError(format!(
                "store target '{trimmed}' does not name a variable"
            )));
        }
        Ok(StoreTarget::Variable(name.to_string()))
    }

    /// The variable name this target writes.
    pub fn variable(&self) -> &str {
        match self {
            StoreTarget::Variable(name) => name,
        }
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

    fn state_with(vars: &[(&str, Value)]) -> PathState {
        PathState::new(
            HashMap::from([("who".to_string(), json!("alice"))]),
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    // -----------------------------------------------------------------------
    // Accessors return copies
    // -----------------------------------------------------------------------

    #[test]
    fn test_accessors_are_defensive_copies() {
        let state = state_with(&[("x", json!(1))]);
        let mut vars = state.variables();
        vars.insert("x".to_string(), json!(99));
        // The store is unchanged.
        assert_eq!(state.variable("x"), Some(json!(1)));
    }

    #[test]
    fn test_set_and_get_variable() {
        let mut state = state_with(&[]);
        state.set_variable("count", json!(5));
        assert_eq!(state.variable("count"), Some(json!(5)));
        assert_eq!(state.variable("missing"), None);
    }

    #[test]
    fn test_expression_context_shape() {
        let state = state_with(&[("x", json!(1))]);
        let ctx = state.to_expression_context();
        assert_eq!(ctx["inputs"]["who"], json!("alice"));
        assert_eq!(ctx["state"]["x"], json!(1));
    }

    // -----------------------------------------------------------------------
    // Patch diffing
    // -----------------------------------------------------------------------

    #[test]
    fn test_diff_detects_changes_additions_and_deletions() {
        let original = HashMap::from([
            ("kept".to_string(), json!("same")),
            ("changed".to_string(), json!(1)),
            ("dropped".to_string(), json!(true)),
        ]);
        let modified = HashMap::from([
            ("kept".to_string(), json!("same")),
            ("changed".to_string(), json!(2)),
            ("added".to_string(), json!([1, 2])),
        ]);

        let patches = diff_variables(&original, &modified);
        assert_eq!(
            patches,
            vec![
                Patch::set("added", json!([1, 2])),
                Patch::set("changed", json!(2)),
                Patch::delete("dropped"),
            ]
        );
    }

    #[test]
    fn test_diff_uses_deep_equality() {
        let original = HashMap::from([("doc".to_string(), json!({"a": {"b": 1}}))]);
        let same = HashMap::from([("doc".to_string(), json!({"a": {"b": 1}}))]);
        let deep_change = HashMap::from([("doc".to_string(), json!({"a": {"b": 2}}))]);

        assert!(diff_variables(&original, &same).is_empty());
        assert_eq!(
            diff_variables(&original, &deep_change),
            vec![Patch::set("doc", json!({"a": {"b": 2}}))]
        );
    }

    #[test]
    fn test_apply_diff_roundtrip() {
        // apply(O, diff(O, M)) == M for arbitrary-ish maps.
        let original = HashMap::from([
            ("a".to_string(), json!(1)),
            ("b".to_string(), json!({"nested": [1, 2, 3]})),
            ("c".to_string(), json!("drop me")),
        ]);
        let modified = HashMap::from([
            ("a".to_string(), json!(2)),
            ("b".to_string(), json!({"nested": [1, 2, 3]})),
            ("d".to_string(), json!(null)),
        ]);

        let patches = diff_variables(&original, &modified);
        let mut state = PathState::new(HashMap::new(), original);
        state.apply_patches(&patches);
        assert_eq!(state.variables(), modified);
    }

    #[test]
    fn test_null_value_is_a_set_not_a_delete() {
        // An explicit null in the modified map is stored, not deleted.
        let original = HashMap::new();
        let modified = HashMap::from([("x".to_string(), Value::Null)]);
        let patches = diff_variables(&original, &modified);
        assert_eq!(patches, vec![Patch::set("x", Value::Null)]);

        let mut state = PathState::new(HashMap::new(), HashMap::new());
        state.apply_patches(&patches);
        assert_eq!(state.variable("x"), Some(Value::Null));
    }

    // -----------------------------------------------------------------------
    // Store targets
    // -----------------------------------------------------------------------

    #[test]
    fn test_store_target_accepts_state_prefix_and_bare_names() {
        assert_eq!(
            StoreTarget::parse("state.result").unwrap().variable(),
            "result"
        );
        assert_eq!(StoreTarget::parse("result").unwrap().variable(), "result");
        assert_eq!(
            StoreTarget::parse("  state.padded  ").unwrap().variable(),
            "padded"
        );
    }

    #[test]
    fn test_store_target_rejects_inputs() {
        assert!(StoreTarget::parse("inputs.value").is_err());
        assert!(StoreTarget::parse("inputs").is_err());
    }

    #[test]
    fn test_store_target_rejects_empty() {
        assert!(StoreTarget::parse("").is_err());
        assert!(StoreTarget::parse("state.").is_err());
    }
}
