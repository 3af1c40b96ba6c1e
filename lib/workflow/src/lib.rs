//! Workflow model for flowscribe.
//!
//! This crate turns raw workflow exports into validated, typed structures:
//!
//! - **Definition**: Identity, metadata, triggers, connections, parameters
//! - **Steps**: A tree of scopes; control-flow steps own nested scopes
//! - **Parser**: Raw JSON to [`WorkflowDefinition`], tolerant of unknown step kinds
//! - **Graph**: Per-scope dependency DAGs with a stable topological order
//! - **Runs**: Outcome samples used for health metrics

pub mod definition;
pub mod edge;
pub mod error;
pub mod graph;
pub mod parser;
pub mod run;
pub mod step;
pub mod trigger;

pub use definition::{
    ConnectionRef, WorkflowDefinition, WorkflowMetadata, WorkflowState, WorkflowSummary,
};
pub use edge::DependencyEdge;
pub use error::{DefinitionError, GraphError};
pub use graph::{GraphNode, NestedScope, ScopeGraph, ScopedStep, WorkflowGraph, declaration_order};
pub use parser::{ParseHints, parse_workflow};
pub use run::{RunOutcomeSample, RunStatus};
pub use step::{ActionStep, Branch, RunAfter, Scope, ScopePath, StepBody, StepType, SwitchCase};
pub use trigger::{Recurrence, Trigger};
