//! Workflow definition types for traverse.
//!
//! Defines the canonical intermediate representation for workflows: YAML
//! files and the programmatic builder both convert to `WorkflowDefinition`.
//! A workflow is a named, possibly-cyclic graph of steps with conditional
//! edges, declared inputs/outputs, and an initial variable map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;

/// Variable map used for inputs, state, params, and outputs.
pub type VarMap = HashMap<String, Value>;

// ---------------------------------------------------------------------------
// Workflow Definition (canonical IR)
// ---------------------------------------------------------------------------

/// The canonical workflow definition. Immutable after construction.
///
/// The first declared step is the implicit start. Steps may form cycles;
/// termination is a workflow-design concern enforced by external timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Human-readable workflow name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared inputs with types, defaults, and required flags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputDef>,
    /// Declared outputs resolved from terminating paths' variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputDef>,
    /// Initial state variables.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub state: VarMap,
    /// Ordered list of step definitions forming the workflow graph.
    pub steps: Vec<StepDefinition>,
    /// Default edge-matching mode for steps without an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_mode: Option<EdgeMode>,
}

impl WorkflowDefinition {
    /// The workflow's default edge-matching mode (`All` if unspecified).
    pub fn default_edge_mode(&self) -> EdgeMode {
        self.edge_mode.unwrap_or(EdgeMode::All)
    }

    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// The implicit start step (first declared).
    pub fn start_step(&self) -> Option<&StepDefinition> {
        self.steps.first()
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// A declared workflow input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDef {
    /// Input name, addressable as `inputs.<name>` in expressions.
    pub name: String,
    /// Expected value kind.
    #[serde(rename = "type", default)]
    pub kind: InputKind,
    /// Default applied when the caller omits the input. A default implies
    /// the input is not required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Whether the caller must supply a value.
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Type tag for a declared input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    String,
    Number,
    Int,
    Bool,
    #[default]
    Any,
}

impl InputKind {
    /// Whether `value` is acceptable for this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            InputKind::String => value.is_string(),
            InputKind::Number => value.is_number(),
            InputKind::Int => value.is_i64() || value.is_u64(),
            InputKind::Bool => value.is_boolean(),
            InputKind::Any => true,
        }
    }
}

/// A declared workflow output.
///
/// Exactly one of `source` (a state-variable name) or `value` (a constant)
/// must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDef {
    /// Output name.
    pub name: String,
    /// State variable to read at path termination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Constant output value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step name. Unique within a workflow.
    pub name: String,
    /// Activity to invoke, looked up in the activity registry.
    pub activity: String,
    /// Activity parameters. String values may contain `${...}` templates.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: VarMap,
    /// Where to write the activity result: `state.x` or bare `x` both write
    /// variable `x`. Writing to `inputs.*` is a validation failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Outbound edges, evaluated in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeDefinition>,
    /// Retry policies, consulted in order; the first match applies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry: Vec<RetryPolicy>,
    /// Catch policies, consulted after retries are exhausted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<CatchPolicy>,
    /// Edge-matching mode override for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_mode: Option<EdgeMode>,
    /// Terminal flag: a path reaching this step terminates after it runs.
    #[serde(default)]
    pub end: bool,
}

/// A possibly-conditional directed transition between two steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    /// Target step name.
    pub to: String,
    /// Condition expression over `{inputs, state}`. Empty or absent means
    /// unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl EdgeDefinition {
    /// Whether this edge matches without evaluating anything.
    pub fn is_unconditional(&self) -> bool {
        self.when.as_deref().is_none_or(|w| w.trim().is_empty())
    }
}

/// Edge-matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Follow every matching edge, forking the path on multi-match.
    All,
    /// Follow the first matching edge in declared order.
    First,
}

// ---------------------------------------------------------------------------
// Retry and catch configuration
// ---------------------------------------------------------------------------

/// Declarative retry policy for a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Error kinds this policy applies to. `all` is a wildcard matching any
    /// non-fatal kind.
    #[serde(default = "default_error_equals")]
    pub error_equals: Vec<ErrorKind>,
    /// Maximum number of retries (the activity runs at most `max_retries + 1`
    /// times).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt: delay(i) = base * rate^i. Must be
    /// >= 1.0.
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            error_equals: default_error_equals(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_rate: default_backoff_rate(),
        }
    }
}

fn default_error_equals() -> Vec<ErrorKind> {
    vec![ErrorKind::All]
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_rate() -> f64 {
    2.0
}

/// Declarative catch handler: route matching errors to another step after
/// retries are exhausted. The transition resets the attempt counter and
/// leaves path-local state untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchPolicy {
    /// Error kinds this handler applies to.
    #[serde(default = "default_error_equals")]
    pub error_equals: Vec<ErrorKind>,
    /// Step to transition the path to.
    pub next: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Helper: build a workflow exercising edges, retry, catch, and outputs.
    fn sample_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            name: "number-triage".to_string(),
            description: Some("Classify a number and record the result".to_string()),
            inputs: vec![InputDef {
                name: "value".to_string(),
                kind: InputKind::Int,
                default: Some(json!(7)),
                required: false,
                description: None,
            }],
            outputs: vec![OutputDef {
                name: "category".to_string(),
                source: Some("category".to_string()),
                value: None,
                description: Some("small or large".to_string()),
            }],
            state: HashMap::from([("attempts".to_string(), json!(0))]),
            steps: vec![
                StepDefinition {
                    name: "classify".to_string(),
                    activity: "categorize_number".to_string(),
                    params: HashMap::from([(
                        "number".to_string(),
                        json!("${ inputs.value }"),
                    )]),
                    store: Some("state.category".to_string()),
                    edges: vec![
                        EdgeDefinition {
                            to: "record-small".to_string(),
                            when: Some("state.category == 'small'".to_string()),
                        },
                        EdgeDefinition {
                            to: "record-large".to_string(),
                            when: Some("state.category == 'large'".to_string()),
                        },
                    ],
                    retry: vec![RetryPolicy {
                        error_equals: vec![ErrorKind::Timeout],
                        max_retries: 2,
                        base_delay_ms: 100,
                        backoff_rate: 2.0,
                    }],
                    catch: vec![CatchPolicy {
                        error_equals: vec![ErrorKind::All],
                        next: "record-small".to_string(),
                    }],
                    edge_mode: Some(EdgeMode::First),
                    end: false,
                },
                StepDefinition {
                    name: "record-small".to_string(),
                    activity: "io.print".to_string(),
                    params: HashMap::from([("message".to_string(), json!("small"))]),
                    store: None,
                    edges: vec![],
                    retry: vec![],
                    catch: vec![],
                    edge_mode: None,
                    end: true,
                },
                StepDefinition {
                    name: "record-large".to_string(),
                    activity: "io.print".to_string(),
                    params: HashMap::from([("message".to_string(), json!("large"))]),
                    store: None,
                    edges: vec![],
                    retry: vec![],
                    catch: vec![],
                    edge_mode: None,
                    end: true,
                },
            ],
            edge_mode: None,
        }
    }

    // -----------------------------------------------------------------------
    // YAML roundtrip
    // -----------------------------------------------------------------------

    #[test]
    fn test_workflow_definition_yaml_roundtrip() {
        let original = sample_workflow();
        let yaml = serde_yaml_ng::to_string(&original).expect("serialize to YAML");
        assert!(yaml.contains("number-triage"));
        assert!(yaml.contains("categorize_number"));

        let parsed: WorkflowDefinition =
            serde_yaml_ng::from_str(&yaml).expect("deserialize from YAML");
        assert_eq!(parsed.name, "number-triage");
        assert_eq!(parsed.steps.len(), 3);
        assert_eq!(parsed.inputs.len(), 1);
        assert_eq!(parsed.outputs.len(), 1);
        assert_eq!(parsed.steps[0].edge_mode, Some(EdgeMode::First));
        assert!(parsed.steps[1].end);
    }

    #[test]
    fn test_workflow_definition_json_roundtrip() {
        let original = sample_workflow();
        let json_str = serde_json::to_string_pretty(&original).expect("serialize to JSON");
        let parsed: WorkflowDefinition =
            serde_json::from_str(&json_str).expect("deserialize from JSON");
        assert_eq!(parsed.name, original.name);
        assert_eq!(parsed.steps.len(), original.steps.len());
    }

    // -----------------------------------------------------------------------
    // Parse from realistic hand-written YAML
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_realistic_yaml_workflow() {
        let yaml = r#"
name: counter-loop
state:
  counter: 0
steps:
  - name: increment
    activity: script
    params:
      source: "state.counter += 1"
    edges:
      - to: increment
        when: "state.counter < 3"
      - to: done
        when: "state.counter >= 3"
  - name: done
    activity: io.print
    params:
      message: "finished at ${ state.counter }"
    end: true
outputs:
  - name: counter
    source: counter
"#;
        let wf: WorkflowDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(wf.name, "counter-loop");
        assert_eq!(wf.steps.len(), 2);
        assert_eq!(wf.steps[0].edges.len(), 2);
        assert_eq!(wf.steps[0].edges[0].to, "increment");
        assert!(wf.steps[1].end);
        assert_eq!(wf.state["counter"], json!(0));
        assert_eq!(wf.default_edge_mode(), EdgeMode::All);
    }

    // -----------------------------------------------------------------------
    // Defaults
    // -----------------------------------------------------------------------

    #[test]
    fn test_retry_policy_defaults() {
        let yaml = "{}";
        let policy: RetryPolicy = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(policy.error_equals, vec![ErrorKind::All]);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.backoff_rate, 2.0);
    }

    #[test]
    fn test_catch_policy_defaults_to_wildcard() {
        let yaml = "next: recovery";
        let policy: CatchPolicy = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(policy.error_equals, vec![ErrorKind::All]);
        assert_eq!(policy.next, "recovery");
    }

    #[test]
    fn test_input_kind_defaults_to_any() {
        let yaml = "name: payload";
        let input: InputDef = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(input.kind, InputKind::Any);
        assert!(!input.required);
    }

    // -----------------------------------------------------------------------
    // InputKind acceptance
    // -----------------------------------------------------------------------

    #[test]
    fn test_input_kind_accepts() {
        assert!(InputKind::String.accepts(&json!("x")));
        assert!(!InputKind::String.accepts(&json!(1)));

        assert!(InputKind::Int.accepts(&json!(42)));
        assert!(!InputKind::Int.accepts(&json!(4.5)));

        assert!(InputKind::Number.accepts(&json!(4.5)));
        assert!(InputKind::Number.accepts(&json!(42)));

        assert!(InputKind::Bool.accepts(&json!(true)));
        assert!(!InputKind::Bool.accepts(&json!("true")));

        assert!(InputKind::Any.accepts(&json!({"a": 1})));
        assert!(InputKind::Any.accepts(&Value::Null));
    }

    // -----------------------------------------------------------------------
    // Edge helpers
    // -----------------------------------------------------------------------

    #[test]
    fn test_edge_unconditional_detection() {
        let bare = EdgeDefinition {
            to: "next".to_string(),
            when: None,
        };
        let blank = EdgeDefinition {
            to: "next".to_string(),
            when: Some("   ".to_string()),
        };
        let cond = EdgeDefinition {
            to: "next".to_string(),
            when: Some("state.x > 1".to_string()),
        };
        assert!(bare.is_unconditional());
        assert!(blank.is_unconditional());
        assert!(!cond.is_unconditional());
    }

    #[test]
    fn test_step_lookup_and_start() {
        let wf = sample_workflow();
        assert!(wf.step("classify").is_some());
        assert!(wf.step("missing").is_none());
        assert_eq!(wf.start_step().unwrap().name, "classify");
    }

    // -----------------------------------------------------------------------
    // EdgeMode serde
    // -----------------------------------------------------------------------

    #[test]
    fn test_edge_mode_serde() {
        assert_eq!(serde_json::to_string(&EdgeMode::All).unwrap(), "\"all\"");
        assert_eq!(serde_json::to_string(&EdgeMode::First).unwrap(), "\"first\"");
        let parsed: EdgeMode = serde_json::from_str("\"first\"").unwrap();
        assert_eq!(parsed, EdgeMode::First);
    }
}
