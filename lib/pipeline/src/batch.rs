//! Batch processing of workflows.
//!
//! Each workflow goes through the pure per-workflow pipeline in
//! [`process_workflow`]:
//!
//! ```text
//! payload -> parse -> graph -> diagram -> document
//!   runs  -> samples -> metrics ------------^
//! ```
//!
//! [`BatchRunner`] runs that pipeline on a bounded worker pool, waits for
//! every workflow, and assembles the sorted inventory and batch report.
//! Failures stay inside their workflow's record.

use crate::error::SourceError;
use crate::source::{SourceQuery, WorkflowInput, WorkflowSource};
use crate::writer::{INVENTORY_FILE, REPORT_FILE};
use flowscribe_core::{BatchId, Result};
use flowscribe_docs::sanitize::sanitize_identifier;
use flowscribe_docs::{
    DiagramRenderer, DiagramSection, DocumentModel, DocumentRenderer, Inventory, InventoryEntry,
    ItemStatus, RunMetrics,
};
use flowscribe_workflow::{
    ParseHints, RunOutcomeSample, WorkflowGraph, WorkflowSummary, parse_workflow,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Settings for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum number of workflows processed at once.
    pub workers: usize,
    /// When false, no diagrams are rendered and the section is omitted.
    pub diagrams: bool,
    /// Run-sample window shown in the documents.
    pub lookback_days: Option<u32>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            diagrams: true,
            lookback_days: None,
        }
    }
}

/// Host parallelism, or 1 if it cannot be determined.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// The result of processing one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOutcome {
    pub name: String,
    pub scope_id: String,
    pub status: ItemStatus,
    /// Present unless the workflow was skipped.
    pub summary: Option<WorkflowSummary>,
    /// Present unless the workflow was skipped.
    pub document: Option<DocumentModel>,
}

impl WorkflowOutcome {
    fn skipped(name: String, scope_id: String, reason: String) -> Self {
        Self {
            name,
            scope_id,
            status: ItemStatus::Skipped { reason },
            summary: None,
            document: None,
        }
    }
}

/// Runs the per-workflow pipeline. Pure apart from logging.
#[must_use]
pub fn process_workflow(input: &WorkflowInput, options: &BatchOptions) -> WorkflowOutcome {
    let hints = ParseHints {
        name: Some(input.name_hint.as_str()),
        scope_id: input.scope_hint.as_deref(),
    };
    let definition = match parse_workflow(&input.payload, &hints) {
        Ok(definition) => definition,
        Err(err) => {
            warn!(workflow = %input.name_hint, error = %err, "skipping workflow");
            return WorkflowOutcome::skipped(
                input.name_hint.clone(),
                input.scope_hint.clone().unwrap_or_default(),
                err.to_string(),
            );
        }
    };

    let samples: Vec<RunOutcomeSample> =
        input.runs.iter().map(RunOutcomeSample::from_value).collect();
    let metrics = RunMetrics::aggregate(&samples);

    let (graph, diagram, status) = match WorkflowGraph::build(&definition) {
        Ok(graph) => {
            let diagram = if options.diagrams {
                DiagramSection::Rendered(DiagramRenderer::render(&definition, &graph))
            } else {
                DiagramSection::Suppressed
            };
            (Some(graph), diagram, ItemStatus::Ok)
        }
        Err(err) => {
            let reason = err.to_string();
            warn!(workflow = %definition.name, scope = %definition.scope_id, error = %reason, "invalid dependency graph");
            let diagram = if options.diagrams {
                DiagramSection::Degraded {
                    reason: reason.clone(),
                }
            } else {
                DiagramSection::Suppressed
            };
            (None, diagram, ItemStatus::Degraded { reason })
        }
    };

    let document =
        DocumentRenderer::new(options.lookback_days).render(&definition, graph.as_ref(), diagram, &metrics);

    WorkflowOutcome {
        name: definition.name.clone(),
        scope_id: definition.scope_id.clone(),
        status,
        summary: Some(WorkflowSummary::from(&definition)),
        document: Some(document),
    }
}

/// Link token for a workflow's document.
///
/// `<scope>__<name>` with both parts sanitized, or just the name when the
/// scope is empty.
#[must_use]
pub fn slug(scope_id: &str, name: &str) -> String {
    if scope_id.is_empty() {
        sanitize_identifier(name)
    } else {
        format!("{}__{}", sanitize_identifier(scope_id), sanitize_identifier(name))
    }
}

/// Returns true when `<slug>.md` would overwrite the inventory or report.
///
/// Compared case-insensitively so case-folding filesystems are covered.
fn is_reserved_slug(slug: &str) -> bool {
    let file = format!("{slug}.md");
    [INVENTORY_FILE, REPORT_FILE]
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(&file))
}

/// One workflow's line in the batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    pub name: String,
    pub scope_id: String,
    /// Link token of the written document, if any.
    pub slug: Option<String>,
    #[serde(flatten)]
    pub status: ItemStatus,
}

/// Structured record of every workflow's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: BatchId,
    /// Sorted by name, then scope id.
    pub items: Vec<ReportItem>,
}

/// A document ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub slug: String,
    pub model: DocumentModel,
}

/// Everything a batch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub report: BatchReport,
    /// In inventory order.
    pub documents: Vec<RenderedDocument>,
    pub inventory: Inventory,
}

/// Processes batches of workflows on a bounded worker pool.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    options: Arc<BatchOptions>,
}

impl BatchRunner {
    #[must_use]
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    #[must_use]
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Lists the source and processes every workflow it returns.
    ///
    /// # Errors
    ///
    /// Fails only if the source cannot be listed.
    #[instrument(skip_all, fields(workers = self.options.workers))]
    pub async fn run(
        &self,
        source: &dyn WorkflowSource,
        query: &SourceQuery,
    ) -> Result<BatchOutcome, SourceError> {
        let inputs = source.list(query).await?;
        Ok(self.process(inputs).await)
    }

    /// Processes already listed workflows.
    ///
    /// Completion order has no effect on the outcome.
    pub async fn process(&self, inputs: Vec<WorkflowInput>) -> BatchOutcome {
        let workers = self.options.workers.max(1);
        let jobs = inputs.into_iter().enumerate().map(|(position, input)| {
            let options = Arc::clone(&self.options);
            async move {
                let name = input.name_hint.clone();
                let scope = input.scope_hint.clone().unwrap_or_default();
                let outcome =
                    match tokio::task::spawn_blocking(move || process_workflow(&input, &options)).await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            warn!(workflow = %name, error = %err, "workflow processing aborted");
                            WorkflowOutcome::skipped(name, scope, format!("processing aborted: {err}"))
                        }
                    };
                (position, outcome)
            }
        });

        let outcomes: Vec<(usize, WorkflowOutcome)> =
            stream::iter(jobs).buffer_unordered(workers).collect().await;

        let outcome = assemble(outcomes);
        info!(
            batch = %outcome.report.id,
            workflows = outcome.inventory.totals.workflows,
            degraded = outcome.inventory.totals.degraded,
            skipped = outcome.inventory.totals.skipped,
            "batch processed"
        );
        outcome
    }
}

/// Sorts outcomes and builds the inventory, documents and report.
///
/// Ties on (name, scope id) keep input order, so duplicate identities get
/// stable `_2`, `_3` slug suffixes.
fn assemble(mut outcomes: Vec<(usize, WorkflowOutcome)>) -> BatchOutcome {
    outcomes.sort_by(|(pa, a), (pb, b)| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.scope_id.cmp(&b.scope_id))
            .then_with(|| pa.cmp(pb))
    });

    let mut used = HashSet::new();
    let mut entries = Vec::with_capacity(outcomes.len());
    let mut items = Vec::with_capacity(outcomes.len());
    let mut documents = Vec::new();

    for (_, outcome) in outcomes {
        let WorkflowOutcome {
            name,
            scope_id,
            status,
            summary,
            document,
        } = outcome;

        let link = match (summary, document) {
            (Some(summary), Some(model)) => {
                let base = slug(&scope_id, &name);
                let mut candidate = base.clone();
                let mut suffix = 2;
                while is_reserved_slug(&candidate) || !used.insert(candidate.clone()) {
                    candidate = format!("{base}_{suffix}");
                    suffix += 1;
                }
                entries.push(InventoryEntry::documented(&summary, candidate.clone(), status.clone()));
                documents.push(RenderedDocument {
                    slug: candidate.clone(),
                    model,
                });
                Some(candidate)
            }
            _ => {
                let reason = status.reason().unwrap_or_default().to_string();
                entries.push(InventoryEntry::skipped(name.clone(), scope_id.clone(), reason));
                None
            }
        };

        items.push(ReportItem {
            name,
            scope_id,
            slug: link,
            status,
        });
    }

    BatchOutcome {
        report: BatchReport {
            id: BatchId::new(),
            items,
        },
        documents,
        inventory: Inventory::aggregate(entries),
    }
}
