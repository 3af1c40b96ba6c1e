//! Workflow definition types.
//!
//! A workflow definition is the parsed, immutable form of one exported
//! workflow:
//! - Identity (name, resource group scope)
//! - Metadata (state, timestamps, version, endpoint, tags)
//! - Triggers and the root scope of action steps
//! - Connections and remaining parameters

use crate::step::Scope;
use crate::trigger::Trigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state reported for a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Enabled,
    Disabled,
    Suspended,
    Unknown,
}

impl WorkflowState {
    /// Parses a raw state string, case-insensitively.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "enabled" => Self::Enabled,
            "disabled" => Self::Disabled,
            "suspended" => Self::Suspended,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "Enabled",
            Self::Disabled => "Disabled",
            Self::Suspended => "Suspended",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub state: WorkflowState,
    /// Azure region or other hosting location.
    pub location: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub changed_at: Option<DateTime<Utc>>,
    pub version: Option<String>,
    /// Endpoint through which the workflow is invoked.
    pub endpoint: Option<String>,
    /// Tags, sorted by key.
    pub tags: BTreeMap<String, String>,
}

impl Default for WorkflowMetadata {
    fn default() -> Self {
        Self {
            state: WorkflowState::Unknown,
            location: None,
            created_at: None,
            changed_at: None,
            version: None,
            endpoint: None,
            tags: BTreeMap::new(),
        }
    }
}

/// An API connection referenced through the `$connections` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRef {
    /// Key under `$connections`.
    pub name: String,
    pub connection_id: Option<String>,
    pub connection_name: Option<String>,
    /// Every other property of the entry, sorted.
    pub properties: BTreeMap<String, JsonValue>,
}

/// A parsed workflow definition.
///
/// Created once per parse and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    /// Resource group (or equivalent) the workflow lives in; may be empty.
    pub scope_id: String,
    pub metadata: WorkflowMetadata,
    /// Triggers in declaration order.
    pub triggers: Vec<Trigger>,
    /// The root scope of action steps.
    pub actions: Scope,
    /// Connections sorted by name.
    pub connections: Vec<ConnectionRef>,
    /// Parameters other than `$connections`, sorted by name.
    pub parameters: BTreeMap<String, JsonValue>,
}

impl WorkflowDefinition {
    /// Creates an empty definition with default metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, scope_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope_id: scope_id.into(),
            metadata: WorkflowMetadata::default(),
            triggers: Vec::new(),
            actions: Scope::default(),
            connections: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// Number of triggers.
    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Number of action steps, nested ones included.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.total_steps()
    }
}

/// Summary information about one workflow of a batch (for the inventory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub scope_id: String,
    pub state: WorkflowState,
    pub trigger_count: usize,
    pub action_count: usize,
}

impl From<&WorkflowDefinition> for WorkflowSummary {
    fn from(definition: &WorkflowDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            scope_id: definition.scope_id.clone(),
            state: definition.metadata.state,
            trigger_count: definition.trigger_count(),
            action_count: definition.action_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{ActionStep, StepBody, StepType};

    #[test]
    fn state_parsing() {
        assert_eq!(WorkflowState::from_raw("Enabled"), WorkflowState::Enabled);
        assert_eq!(WorkflowState::from_raw("DISABLED"), WorkflowState::Disabled);
        assert_eq!(WorkflowState::from_raw("Suspended"), WorkflowState::Suspended);
        assert_eq!(WorkflowState::from_raw("Deleted"), WorkflowState::Unknown);
    }

    #[test]
    fn new_definition_is_empty() {
        let definition = WorkflowDefinition::new("orders", "rg-prod");
        assert_eq!(definition.trigger_count(), 0);
        assert_eq!(definition.action_count(), 0);
        assert_eq!(definition.metadata.state, WorkflowState::Unknown);
    }

    #[test]
    fn summary_counts_nested_actions() {
        let mut definition = WorkflowDefinition::new("orders", "rg-prod");
        definition.metadata.state = WorkflowState::Enabled;
        definition.triggers.push(Trigger::new("manual", "Request", 0));
        definition.actions = Scope::new(vec![ActionStep::new("Check", StepType::Condition, 0)
            .with_body(StepBody::Condition {
                if_true: Scope::new(vec![ActionStep::new("X", StepType::Compose, 0)]),
                if_false: Scope::new(vec![ActionStep::new("Y", StepType::Compose, 0)]),
            })]);

        let summary = WorkflowSummary::from(&definition);
        assert_eq!(summary.trigger_count, 1);
        assert_eq!(summary.action_count, 3);
        assert_eq!(summary.state, WorkflowState::Enabled);
    }
}
