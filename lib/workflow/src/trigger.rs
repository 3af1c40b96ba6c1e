//! Trigger types for workflow initiation.
//!
//! Triggers are the entry points of the root scope. In the dependency graph
//! every trigger hangs off the synthetic start node, and root steps without
//! predecessors hang off every trigger.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// How often a recurring trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Number of `frequency` units between firings.
    pub interval: u64,
    /// Unit of the interval (e.g. "Minute", "Day").
    pub frequency: String,
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.interval, self.frequency)
    }
}

/// A trigger declared by a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Name, unique among the workflow's triggers.
    pub name: String,
    /// Raw type tag (e.g. "Recurrence", "Request", "ApiConnection").
    pub trigger_type: String,
    /// Position in declaration order.
    pub declaration_index: usize,
    pub recurrence: Option<Recurrence>,
    /// Raw `inputs` blob, kept for previews.
    pub configuration: Option<JsonValue>,
}

impl Trigger {
    /// Creates a trigger with no recurrence or configuration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        trigger_type: impl Into<String>,
        declaration_index: usize,
    ) -> Self {
        Self {
            name: name.into(),
            trigger_type: trigger_type.into(),
            declaration_index,
            recurrence: None,
            configuration: None,
        }
    }

    /// Sets the recurrence.
    #[must_use]
    pub fn with_recurrence(mut self, interval: u64, frequency: impl Into<String>) -> Self {
        self.recurrence = Some(Recurrence {
            interval,
            frequency: frequency.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurrence_display() {
        let trigger = Trigger::new("Every_hour", "Recurrence", 0).with_recurrence(1, "Hour");
        assert_eq!(
            trigger.recurrence.expect("recurrence").to_string(),
            "every 1 Hour"
        );
    }

    #[test]
    fn trigger_without_recurrence() {
        let trigger = Trigger::new("manual", "Request", 0);
        assert!(trigger.recurrence.is_none());
        assert!(trigger.configuration.is_none());
        assert_eq!(trigger.trigger_type, "Request");
    }
}
