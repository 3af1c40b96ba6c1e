//! Error types for the workflow crate.
//!
//! - `DefinitionError`: the raw structure cannot be turned into a definition;
//!   the workflow is skipped.
//! - `GraphError`: a scope's dependencies are unresolved or cyclic; only the
//!   diagram of the workflow is lost.
//!
//! Both carry only what the layer knows. Workflow identity is added by the
//! batch layer when it records the outcome.

use crate::step::ScopePath;
use std::fmt;

/// Errors from parsing a raw workflow definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The top-level value is not a JSON object.
    NotAMapping { found: &'static str },
    /// A section (`triggers`, `actions`, a branch, `runAfter`) has the wrong shape.
    InvalidSection {
        section: String,
        expected: &'static str,
        found: &'static str,
    },
    /// Neither the definition nor the caller supplied a workflow name.
    MissingName,
    /// A trigger or step cannot be interpreted.
    InvalidStep { name: String, reason: String },
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAMapping { found } => {
                write!(f, "definition must be an object, found {found}")
            }
            Self::InvalidSection {
                section,
                expected,
                found,
            } => {
                write!(f, "section '{section}' must be {expected}, found {found}")
            }
            Self::MissingName => write!(f, "workflow has no name"),
            Self::InvalidStep { name, reason } => {
                if name.is_empty() {
                    write!(f, "invalid step: {reason}")
                } else {
                    write!(f, "invalid step '{name}': {reason}")
                }
            }
        }
    }
}

impl std::error::Error for DefinitionError {}

/// Errors from building a scope's dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A `runAfter` entry names a step not declared in the same scope.
    UnresolvedReference {
        scope: ScopePath,
        step: String,
        reference: String,
    },
    /// The scope's dependencies form a cycle; `path` starts and ends on the
    /// same step.
    CycleDetected { scope: ScopePath, path: Vec<String> },
}

impl GraphError {
    /// The scope the error was found in.
    #[must_use]
    pub fn scope(&self) -> &ScopePath {
        match self {
            Self::UnresolvedReference { scope, .. } | Self::CycleDetected { scope, .. } => scope,
        }
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedReference {
                scope,
                step,
                reference,
            } => {
                write!(
                    f,
                    "step '{step}' in scope {scope} runs after undeclared step '{reference}'"
                )
            }
            Self::CycleDetected { scope, path } => {
                write!(f, "cycle in scope {scope}: {}", path.join(" -> "))
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Describes a JSON value's kind for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
