//! Per-workflow document model.
//!
//! [`DocumentRenderer`] combines a definition, its diagram outcome and its run
//! metrics into a [`DocumentModel`]. Sections always come in the same order;
//! the diagram section is the only one that may be absent. Every free-text
//! cell is already markdown-escaped, so emitters copy cells verbatim.

use crate::diagram::Diagram;
use crate::metrics::{RunMetrics, SuccessRate};
use crate::sanitize::{escape_markdown, truncate_preview};
use chrono::{DateTime, SecondsFormat, Utc};
use flowscribe_workflow::{ScopedStep, Trigger, WorkflowDefinition, WorkflowGraph, declaration_order};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Longest inputs preview, in characters, before truncation.
pub const PREVIEW_MAX_CHARS: usize = 80;

/// Placeholder for missing values.
const EMPTY_CELL: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Overview,
    Metrics,
    Diagram,
    Triggers,
    Actions,
    Connections,
    Parameters,
}

impl SectionKind {
    /// Heading text of the section.
    #[must_use]
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Metrics => "Run metrics",
            Self::Diagram => "Diagram",
            Self::Triggers => "Triggers",
            Self::Actions => "Actions",
            Self::Connections => "Connections",
            Self::Parameters => "Parameters",
        }
    }
}

/// A name/value pair of a properties section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum SectionBody {
    Properties(Vec<Property>),
    Table(Table),
    Diagram(Diagram),
    /// A short note shown instead of content.
    Notice(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: String,
    pub body: SectionBody,
}

impl Section {
    fn new(kind: SectionKind, body: SectionBody) -> Self {
        Self {
            kind,
            heading: kind.heading().to_string(),
            body,
        }
    }
}

/// The format-independent document of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentModel {
    /// Escaped workflow name.
    pub title: String,
    pub sections: Vec<Section>,
}

impl DocumentModel {
    /// Finds a section by kind.
    #[must_use]
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

/// What to show in the diagram section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramSection {
    Rendered(Diagram),
    /// The graph was invalid; a notice with the reason replaces the diagram.
    Degraded { reason: String },
    /// Diagrams are turned off; the section is omitted.
    Suppressed,
}

/// Builds [`DocumentModel`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRenderer {
    lookback_days: Option<u32>,
}

impl DocumentRenderer {
    /// `lookback_days` is the run-sample window shown with the metrics.
    #[must_use]
    pub fn new(lookback_days: Option<u32>) -> Self {
        Self { lookback_days }
    }

    /// Renders one workflow's document.
    ///
    /// `graph` orders the actions table; without it, actions are listed in
    /// declaration order.
    #[must_use]
    pub fn render(
        &self,
        definition: &WorkflowDefinition,
        graph: Option<&WorkflowGraph>,
        diagram: DiagramSection,
        metrics: &RunMetrics,
    ) -> DocumentModel {
        let mut sections = vec![
            Section::new(SectionKind::Overview, overview(definition)),
            Section::new(SectionKind::Metrics, self.metrics(metrics)),
        ];

        match diagram {
            DiagramSection::Rendered(diagram) => {
                sections.push(Section::new(SectionKind::Diagram, SectionBody::Diagram(diagram)));
            }
            DiagramSection::Degraded { reason } => sections.push(Section::new(
                SectionKind::Diagram,
                SectionBody::Notice(escape_markdown(&format!(
                    "Diagram unavailable: {reason}"
                ))),
            )),
            DiagramSection::Suppressed => {}
        }

        let steps = match graph {
            Some(graph) => graph.ordered_steps(&definition.actions),
            None => declaration_order(&definition.actions),
        };

        sections.extend([
            Section::new(SectionKind::Triggers, triggers(&definition.triggers)),
            Section::new(SectionKind::Actions, actions(&steps)),
            Section::new(SectionKind::Connections, connections(definition)),
            Section::new(SectionKind::Parameters, parameters(definition)),
        ]);

        DocumentModel {
            title: escape_markdown(&definition.name),
            sections,
        }
    }

    fn metrics(&self, metrics: &RunMetrics) -> SectionBody {
        let window = self
            .lookback_days
            .map_or_else(|| EMPTY_CELL.to_string(), |days| format!("last {days} days"));
        let rate = match metrics.success_rate() {
            rate @ SuccessRate::Percent { .. } => format!("{rate}%"),
            rate => rate.to_string(),
        };
        SectionBody::Properties(vec![
            Property::new("Window", window),
            Property::new("Total runs", metrics.total.to_string()),
            Property::new("Succeeded", metrics.succeeded.to_string()),
            Property::new("Failed", metrics.failed.to_string()),
            Property::new("Cancelled", metrics.cancelled.to_string()),
            Property::new("Running", metrics.running.to_string()),
            Property::new("Other", metrics.other.to_string()),
            Property::new("Success rate", escape_markdown(&rate)),
        ])
    }
}

fn overview(definition: &WorkflowDefinition) -> SectionBody {
    let metadata = &definition.metadata;
    let tags = if metadata.tags.is_empty() {
        EMPTY_CELL.to_string()
    } else {
        let joined: Vec<String> = metadata
            .tags
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        escape_markdown(&joined.join(", "))
    };

    SectionBody::Properties(vec![
        Property::new("Name", escape_markdown(&definition.name)),
        Property::new("Resource group", text_or_empty(Some(definition.scope_id.as_str()))),
        Property::new("Location", text_or_empty(metadata.location.as_deref())),
        Property::new("State", metadata.state.as_str()),
        Property::new("Created", timestamp(metadata.created_at)),
        Property::new("Changed", timestamp(metadata.changed_at)),
        Property::new("Version", text_or_empty(metadata.version.as_deref())),
        Property::new("Endpoint", text_or_empty(metadata.endpoint.as_deref())),
        Property::new("Tags", tags),
    ])
}

fn triggers(triggers: &[Trigger]) -> SectionBody {
    let mut table = Table::with_columns(&["Name", "Type", "Recurrence", "Inputs"]);
    table.rows = triggers
        .iter()
        .map(|trigger| {
            vec![
                escape_markdown(&trigger.name),
                escape_markdown(&trigger.trigger_type),
                trigger
                    .recurrence
                    .as_ref()
                    .map_or_else(|| EMPTY_CELL.to_string(), |r| escape_markdown(&r.to_string())),
                preview(trigger.configuration.as_ref()),
            ]
        })
        .collect();
    SectionBody::Table(table)
}

fn actions(steps: &[ScopedStep<'_>]) -> SectionBody {
    let mut table = Table::with_columns(&["Name", "Type", "Scope", "Run after", "Inputs"]);
    table.rows = steps
        .iter()
        .map(|scoped| {
            let step = scoped.step;
            let run_after = if step.run_after.is_empty() {
                EMPTY_CELL.to_string()
            } else {
                let deps: Vec<String> = step
                    .run_after
                    .iter()
                    .map(|dep| {
                        if dep.is_default() {
                            dep.step.clone()
                        } else {
                            format!("{} ({})", dep.step, dep.statuses.join(", "))
                        }
                    })
                    .collect();
                escape_markdown(&deps.join(", "))
            };
            vec![
                escape_markdown(&step.name),
                escape_markdown(step.step_type.as_str()),
                escape_markdown(&scoped.path.to_string()),
                run_after,
                preview(step.inputs.as_ref()),
            ]
        })
        .collect();
    SectionBody::Table(table)
}

fn connections(definition: &WorkflowDefinition) -> SectionBody {
    let mut table = Table::with_columns(&["Name", "Connection name", "Connection id"]);
    table.rows = definition
        .connections
        .iter()
        .map(|connection| {
            vec![
                escape_markdown(&connection.name),
                text_or_empty(connection.connection_name.as_deref()),
                text_or_empty(connection.connection_id.as_deref()),
            ]
        })
        .collect();
    SectionBody::Table(table)
}

fn parameters(definition: &WorkflowDefinition) -> SectionBody {
    let mut table = Table::with_columns(&["Name", "Value"]);
    table.rows = definition
        .parameters
        .iter()
        .map(|(name, entry)| vec![escape_markdown(name), preview(Some(parameter_value(entry)))])
        .collect();
    SectionBody::Table(table)
}

/// The shown value of a parameter: `value`, else `defaultValue`, else the
/// entry itself. Null fields count as missing.
fn parameter_value(entry: &JsonValue) -> &JsonValue {
    ["value", "defaultValue"]
        .iter()
        .filter_map(|key| entry.get(key))
        .find(|value| !value.is_null())
        .unwrap_or(entry)
}

/// Compact, escaped and truncated JSON preview; `-` when absent or null.
///
/// Strings are shown without quotes.
#[must_use]
pub fn preview(value: Option<&JsonValue>) -> String {
    let text = match value {
        None | Some(JsonValue::Null) => return EMPTY_CELL.to_string(),
        Some(JsonValue::String(text)) => text.clone(),
        Some(value) => value.to_string(),
    };
    escape_markdown(&truncate_preview(&text, PREVIEW_MAX_CHARS))
}

fn text_or_empty(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.is_empty() => escape_markdown(text),
        _ => EMPTY_CELL.to_string(),
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || EMPTY_CELL.to_string(),
        |at| at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
