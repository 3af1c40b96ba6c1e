//! Batch-level inventory of documented workflows.

use flowscribe_workflow::{WorkflowState, WorkflowSummary};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a workflow got through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Fully documented.
    Ok,
    /// Documented, but the diagram was replaced by a notice.
    Degraded { reason: String },
    /// Not documented.
    Skipped { reason: String },
}

impl ItemStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded { .. } => "degraded",
            Self::Skipped { .. } => "skipped",
        }
    }

    /// Reason for a degraded or skipped item.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Degraded { reason } | Self::Skipped { reason } => Some(reason),
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {reason}", self.as_str()),
            None => f.write_str(self.as_str()),
        }
    }
}

/// One row of the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub name: String,
    pub scope_id: String,
    pub state: WorkflowState,
    pub trigger_count: usize,
    pub action_count: usize,
    /// Link token of the workflow's document; `None` when skipped.
    pub link: Option<String>,
    pub status: ItemStatus,
}

impl InventoryEntry {
    /// Entry for a documented workflow.
    #[must_use]
    pub fn documented(summary: &WorkflowSummary, link: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            name: summary.name.clone(),
            scope_id: summary.scope_id.clone(),
            state: summary.state,
            trigger_count: summary.trigger_count,
            action_count: summary.action_count,
            link: Some(link.into()),
            status,
        }
    }

    /// Reduced entry for a workflow that could not be parsed.
    #[must_use]
    pub fn skipped(
        name: impl Into<String>,
        scope_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            scope_id: scope_id.into(),
            state: WorkflowState::Unknown,
            trigger_count: 0,
            action_count: 0,
            link: None,
            status: ItemStatus::Skipped {
                reason: reason.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTotals {
    pub workflows: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub suspended: usize,
    pub unknown: usize,
    pub triggers: usize,
    pub actions: usize,
    pub degraded: usize,
    pub skipped: usize,
}

/// Sorted entries plus totals for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub entries: Vec<InventoryEntry>,
    pub totals: InventoryTotals,
}

impl Inventory {
    /// Sorts entries by name, then scope id, and computes the totals.
    #[must_use]
    pub fn aggregate(mut entries: Vec<InventoryEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.scope_id.cmp(&b.scope_id)));

        let mut totals = InventoryTotals {
            workflows: entries.len(),
            ..InventoryTotals::default()
        };
        for entry in &entries {
            match entry.state {
                WorkflowState::Enabled => totals.enabled += 1,
                WorkflowState::Disabled => totals.disabled += 1,
                WorkflowState::Suspended => totals.suspended += 1,
                WorkflowState::Unknown => totals.unknown += 1,
            }
            match entry.status {
                ItemStatus::Ok => {}
                ItemStatus::Degraded { .. } => totals.degraded += 1,
                ItemStatus::Skipped { .. } => totals.skipped += 1,
            }
            totals.triggers += entry.trigger_count;
            totals.actions += entry.action_count;
        }

        Self { entries, totals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, scope: &str, state: WorkflowState) -> WorkflowSummary {
        WorkflowSummary {
            name: name.to_string(),
            scope_id: scope.to_string(),
            state,
            trigger_count: 1,
            action_count: 3,
        }
    }

    #[test]
    fn empty_batch_has_zero_totals() {
        let inventory = Inventory::aggregate(Vec::new());
        assert!(inventory.entries.is_empty());
        assert_eq!(inventory.totals, InventoryTotals::default());
    }

    #[test]
    fn entries_sort_by_name_then_scope() {
        let inventory = Inventory::aggregate(vec![
            InventoryEntry::documented(&summary("b", "rg1", WorkflowState::Enabled), "b", ItemStatus::Ok),
            InventoryEntry::documented(&summary("a", "rg2", WorkflowState::Enabled), "a2", ItemStatus::Ok),
            InventoryEntry::documented(&summary("a", "rg1", WorkflowState::Enabled), "a1", ItemStatus::Ok),
        ]);
        let keys: Vec<_> = inventory
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.scope_id.as_str()))
            .collect();
        assert_eq!(keys, vec![("a", "rg1"), ("a", "rg2"), ("b", "rg1")]);
    }

    #[test]
    fn totals_count_states_and_outcomes() {
        let inventory = Inventory::aggregate(vec![
            InventoryEntry::documented(&summary("a", "rg", WorkflowState::Enabled), "a", ItemStatus::Ok),
            InventoryEntry::documented(
                &summary("b", "rg", WorkflowState::Disabled),
                "b",
                ItemStatus::Degraded {
                    reason: "cycle".to_string(),
                },
            ),
            InventoryEntry::skipped("broken", "rg", "workflow has no name"),
        ]);

        let totals = inventory.totals;
        assert_eq!(totals.workflows, 3);
        assert_eq!(totals.enabled, 1);
        assert_eq!(totals.disabled, 1);
        assert_eq!(totals.unknown, 1);
        assert_eq!(totals.suspended, 0);
        assert_eq!(totals.triggers, 2);
        assert_eq!(totals.actions, 6);
        assert_eq!(totals.degraded, 1);
        assert_eq!(totals.skipped, 1);
    }

    #[test]
    fn skipped_entries_are_reduced() {
        let entry = InventoryEntry::skipped("broken", "", "definition must be an object, found null");
        assert_eq!(entry.state, WorkflowState::Unknown);
        assert_eq!(entry.link, None);
        assert_eq!(
            entry.status.to_string(),
            "skipped: definition must be an object, found null"
        );
    }
}
