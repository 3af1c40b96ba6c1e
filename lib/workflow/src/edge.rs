//! Edge types for dependency graphs.
//!
//! An edge points from the node that must finish first to the node that
//! waits on it. Entry edges are synthesized (start → trigger, start/trigger →
//! step without predecessors); run-after edges come from `runAfter`.

use crate::step::{RunAfter, succeeded_only};
use serde::{Deserialize, Serialize};

/// An edge of a scope's dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyEdge {
    /// Synthesized edge into a trigger or a step without predecessors.
    Entry,
    /// Declared `runAfter` dependency.
    RunAfter {
        /// Statuses of the source that release the target.
        statuses: Vec<String>,
    },
}

impl DependencyEdge {
    /// Creates a run-after edge from a parsed reference.
    #[must_use]
    pub fn from_run_after(run_after: &RunAfter) -> Self {
        Self::RunAfter {
            statuses: run_after.statuses.clone(),
        }
    }

    /// Returns a label when the edge waits on anything other than plain success.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        match self {
            Self::Entry => None,
            Self::RunAfter { statuses } => (!succeeded_only(statuses)).then(|| statuses.join(", ")),
        }
    }
}

impl Default for DependencyEdge {
    fn default() -> Self {
        Self::Entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_edges_have_no_label() {
        assert_eq!(DependencyEdge::Entry.label(), None);
        assert_eq!(DependencyEdge::default(), DependencyEdge::Entry);
    }

    #[test]
    fn plain_success_has_no_label() {
        let edge = DependencyEdge::from_run_after(&RunAfter::succeeded("A"));
        assert_eq!(edge.label(), None);
    }

    #[test]
    fn other_statuses_are_labelled() {
        let edge = DependencyEdge::RunAfter {
            statuses: vec!["Failed".to_string(), "TimedOut".to_string()],
        };
        assert_eq!(edge.label().as_deref(), Some("Failed, TimedOut"));
    }

    #[test]
    fn label_agrees_with_default_run_after() {
        let cases = [
            vec![],
            vec!["Succeeded".to_string()],
            vec!["succeeded".to_string()],
            vec!["Failed".to_string()],
            vec!["Succeeded".to_string(), "Skipped".to_string()],
        ];
        for statuses in cases {
            let run_after = RunAfter {
                step: "A".to_string(),
                statuses,
            };
            let edge = DependencyEdge::from_run_after(&run_after);
            assert_eq!(edge.label().is_none(), run_after.is_default(), "{run_after:?}");
        }
    }
}
