//! Workflow definition parsing, validation, and input resolution.
//!
//! Converts between YAML files and the canonical `WorkflowDefinition` IR,
//! validates structural constraints (unique step names, resolvable edge and
//! catch targets, legal store targets, sane backoff rates), and resolves
//! caller-provided inputs against the declared input list.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;
use traverse_types::workflow::{VarMap, WorkflowDefinition};

use crate::state::StoreTarget;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or validating a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML (or JSON; YAML is a superset) string into a validated
/// `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Serialize a `WorkflowDefinition` to a YAML string.
pub fn serialize_workflow_yaml(def: &WorkflowDefinition) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(def).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Load a workflow definition from a YAML file.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow_yaml(&content)
}

/// Save a workflow definition to a YAML file, creating parent directories.
pub fn save_workflow_file(path: &Path, def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serialize_workflow_yaml(def)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - Name is non-empty
/// - At least one step exists
/// - All step names are unique
/// - Every edge target and catch target names an existing step
/// - Store targets parse and never address `inputs.*`
/// - Retry backoff rates are >= 1.0
/// - Inputs are not both required and defaulted; input names are unique
/// - Outputs name exactly one of `source`/`value`; output names are unique
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.name.trim().is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow name must not be empty".to_string(),
        ));
    }

    if def.steps.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow must have at least one step".to_string(),
        ));
    }

    // Unique step names
    let mut names = HashSet::new();
    for step in &def.steps {
        if step.name.trim().is_empty() {
            return Err(WorkflowError::ValidationError(
                "step name must not be empty".to_string(),
            ));
        }
        if !names.insert(step.name.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate step name: '{}'",
                step.name
            )));
        }
    }

    for step in &def.steps {
        if step.activity.trim().is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' does not name an activity",
                step.name
            )));
        }

        // Edge targets must resolve
        for edge in &step.edges {
            if !names.contains(edge.to.as_str()) {
                return Err(WorkflowError::ValidationError(format!(
                    "step '{}' has an edge to unknown step '{}'",
                    step.name, edge.to
                )));
            }
        }

        // Catch targets must resolve
        for policy in &step.catch {
            if !names.contains(policy.next.as_str()) {
                return Err(WorkflowError::ValidationError(format!(
                    "step '{}' catches to unknown step '{}'",
                    step.name, policy.next
                )));
            }
        }

        // Store targets must parse (and never address inputs)
        if let Some(store) = &step.store {
            StoreTarget::parse(store).map_err(|e| {
                WorkflowError::ValidationError(format!("step '{}': {e}", step.name))
            })?;
        }

        // Backoff must not shrink
        for policy in &step.retry {
            if policy.backoff_rate < 1.0 {
                return Err(WorkflowError::ValidationError(format!(
                    "step '{}' has retry backoff_rate {} (must be >= 1.0)",
                    step.name, policy.backoff_rate
                )));
            }
        }
    }

    // Inputs
    let mut input_names = HashSet::new();
    for input in &def.inputs {
        if !input_names.insert(input.name.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate input name: '{}'",
                input.name
            )));
        }
        if let Some(default) = &input.default
            && !input.kind.accepts(default)
        {
            return Err(WorkflowError::ValidationError(format!(
                "input '{}' default does not match its declared type",
                input.name
            )));
        }
    }

    // Outputs
    let mut output_names = HashSet::new();
    for output in &def.outputs {
        if !output_names.insert(output.name.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate output name: '{}'",
                output.name
            )));
        }
        match (&output.source, &output.value) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(WorkflowError::ValidationError(format!(
                    "output '{}' must set exactly one of 'source' or 'value'",
                    output.name
                )));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Input resolution
// ---------------------------------------------------------------------------

/// Resolve caller-provided inputs against the declared input list.
///
/// Applies defaults, enforces required inputs, and checks type tags. A
/// default implies the input is not required. Undeclared provided keys are
/// rejected.
pub fn resolve_inputs(
    def: &WorkflowDefinition,
    provided: VarMap,
) -> Result<VarMap, WorkflowError> {
    let declared: HashSet<&str> = def.inputs.iter().map(|i| i.name.as_str()).collect();
    for key in provided.keys() {
        if !declared.contains(key.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "unknown input '{key}'"
            )));
        }
    }

    let mut resolved = VarMap::new();
    for input in &def.inputs {
        match provided.get(&input.name) {
            Some(value) => {
                if !input.kind.accepts(value) {
                    return Err(WorkflowError::ValidationError(format!(
                        "input '{}' is not a valid {:?}",
                        input.name, input.kind
                    )));
                }
                resolved.insert(input.name.clone(), value.clone());
            }
            None => {
                if let Some(default) = &input.default {
                    resolved.insert(input.name.clone(), default.clone());
                } else if input.required {
                    return Err(WorkflowError::ValidationError(format!(
                        "required input '{}' was not provided",
                        input.name
                    )));
                }
            }
        }
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
