//! Action steps and the scopes that own them.
//!
//! A workflow body is a tree: the root [`Scope`] holds steps, and every
//! control-flow step owns one or more nested scopes. Predecessor references
//! (`runAfter`) only ever name steps of the same scope, so a scope is the
//! unit of dependency validation.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// The status a dependency waits on when none is declared.
pub const DEFAULT_RUN_AFTER_STATUS: &str = "Succeeded";

/// The kind of an action step.
///
/// Unknown type strings are kept verbatim in [`StepType::Other`] so new step
/// kinds never break parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Http,
    ApiConnection,
    Compose,
    InitializeVariable,
    SetVariable,
    IncrementVariable,
    AppendToArrayVariable,
    Condition,
    Switch,
    Foreach,
    Until,
    ParseJson,
    Response,
    Terminate,
    Other(String),
}

impl StepType {
    /// Maps a raw type string to a step type, case-insensitively.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "http" => Self::Http,
            "apiconnection" => Self::ApiConnection,
            "compose" => Self::Compose,
            "initializevariable" => Self::InitializeVariable,
            "setvariable" => Self::SetVariable,
            "incrementvariable" => Self::IncrementVariable,
            "appendtoarrayvariable" => Self::AppendToArrayVariable,
            "if" | "condition" => Self::Condition,
            "switch" => Self::Switch,
            "foreach" => Self::Foreach,
            "until" => Self::Until,
            "parsejson" => Self::ParseJson,
            "response" => Self::Response,
            "terminate" => Self::Terminate,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Returns true for the step types that own nested scopes.
    #[must_use]
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Self::Condition | Self::Switch | Self::Foreach | Self::Until
        )
    }

    /// Returns the display name of this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "Http",
            Self::ApiConnection => "ApiConnection",
            Self::Compose => "Compose",
            Self::InitializeVariable => "InitializeVariable",
            Self::SetVariable => "SetVariable",
            Self::IncrementVariable => "IncrementVariable",
            Self::AppendToArrayVariable => "AppendToArrayVariable",
            Self::Condition => "Condition",
            Self::Switch => "Switch",
            Self::Foreach => "Foreach",
            Self::Until => "Until",
            Self::ParseJson => "ParseJson",
            Self::Response => "Response",
            Self::Terminate => "Terminate",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predecessor reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAfter {
    /// Name of the predecessor step, in the same scope.
    pub step: String,
    /// Statuses of the predecessor that release this step.
    pub statuses: Vec<String>,
}

impl RunAfter {
    /// Creates a reference that waits for the predecessor to succeed.
    #[must_use]
    pub fn succeeded(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            statuses: vec![DEFAULT_RUN_AFTER_STATUS.to_string()],
        }
    }

    /// Returns true when this dependency waits on nothing but success.
    #[must_use]
    pub fn is_default(&self) -> bool {
        succeeded_only(&self.statuses)
    }
}

/// Returns true when `statuses` release a step on success alone.
///
/// An empty list means the same as `["Succeeded"]`.
pub(crate) fn succeeded_only(statuses: &[String]) -> bool {
    match statuses {
        [] => true,
        [status] => status.eq_ignore_ascii_case(DEFAULT_RUN_AFTER_STATUS),
        _ => false,
    }
}

/// An ordered list of steps whose dependencies resolve among themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub steps: Vec<ActionStep>,
}

impl Scope {
    /// Creates a scope from steps in declaration order.
    #[must_use]
    pub fn new(steps: Vec<ActionStep>) -> Self {
        Self { steps }
    }

    /// Returns true if the scope holds no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Looks up a step of this scope by name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&ActionStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Counts the steps in this scope and every nested scope.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.steps
            .iter()
            .map(|step| {
                1 + step
                    .body
                    .branches()
                    .iter()
                    .map(|(_, scope)| scope.total_steps())
                    .sum::<usize>()
            })
            .sum()
    }
}

/// One case of a switch step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// The case's key in the definition.
    pub name: String,
    /// The value the switch expression is matched against.
    pub value: String,
    pub scope: Scope,
}

/// Identifies one nested scope of a control-flow step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Branch {
    True,
    False,
    Case { name: String, value: String },
    Default,
    Body,
}

impl Branch {
    /// Label for the edge leading into this branch, if it has one.
    #[must_use]
    pub fn edge_label(&self) -> Option<&str> {
        match self {
            Self::True => Some("true"),
            Self::False => Some("false"),
            Self::Case { value, .. } => Some(value),
            Self::Default => Some("default"),
            Self::Body => None,
        }
    }

    /// Short stable key used in scope paths and identifiers.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Case { name, .. } => name,
            Self::Default => "default",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Location of a scope within the step tree.
///
/// The root scope has an empty path; each nested scope appends the owning
/// step's name and the branch key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopePath(Vec<(String, String)>);

impl ScopePath {
    /// The root scope.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// The path of a nested scope owned by `owner` under `branch`.
    #[must_use]
    pub fn child(&self, owner: &str, branch: &Branch) -> Self {
        let mut segments = self.0.clone();
        segments.push((owner.to_string(), branch.key().to_string()));
        Self(segments)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Nesting depth; zero for the root scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|(owner, branch)| format!("{owner}/{branch}"))
            .collect();
        f.write_str(&rendered.join("/"))
    }
}

/// The body of a step: simple, or owning nested scopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepBody {
    Simple,
    Condition {
        if_true: Scope,
        if_false: Scope,
    },
    Switch {
        cases: Vec<SwitchCase>,
        default: Scope,
    },
    Loop {
        body: Scope,
    },
}

impl StepBody {
    /// Returns the nested scopes in presentation order.
    ///
    /// Switch cases come in declaration order with the default last.
    #[must_use]
    pub fn branches(&self) -> Vec<(Branch, &Scope)> {
        match self {
            Self::Simple => Vec::new(),
            Self::Condition { if_true, if_false } => {
                vec![(Branch::True, if_true), (Branch::False, if_false)]
            }
            Self::Switch { cases, default } => cases
                .iter()
                .map(|case| {
                    (
                        Branch::Case {
                            name: case.name.clone(),
                            value: case.value.clone(),
                        },
                        &case.scope,
                    )
                })
                .chain(std::iter::once((Branch::Default, default)))
                .collect(),
            Self::Loop { body } => vec![(Branch::Body, body)],
        }
    }
}

/// A single action of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    /// Name, unique within the owning scope.
    pub name: String,
    pub step_type: StepType,
    /// Position within the owning scope's declaration order.
    pub declaration_index: usize,
    pub run_after: Vec<RunAfter>,
    /// Raw `inputs` blob, kept for previews.
    pub inputs: Option<JsonValue>,
    pub body: StepBody,
}

impl ActionStep {
    /// Creates a simple step with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, step_type: StepType, declaration_index: usize) -> Self {
        Self {
            name: name.into(),
            step_type,
            declaration_index,
            run_after: Vec::new(),
            inputs: None,
            body: StepBody::Simple,
        }
    }

    /// Adds a predecessor that must succeed first.
    #[must_use]
    pub fn after(mut self, step: impl Into<String>) -> Self {
        self.run_after.push(RunAfter::succeeded(step));
        self
    }

    /// Sets the nested body.
    #[must_use]
    pub fn with_body(mut self, body: StepBody) -> Self {
        self.body = body;
        self
    }

    /// Sets the raw inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: JsonValue) -> Self {
        self.inputs = Some(inputs);
        self
    }
}
