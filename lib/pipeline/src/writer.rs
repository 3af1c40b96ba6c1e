//! Artifact writers.
//!
//! An [`ArtifactWriter`] persists the rendered outputs of a batch: one
//! document per documented workflow, the inventory page, and the batch
//! report. [`write_artifacts`] writes a whole [`BatchOutcome`] and keeps
//! going past individual failures.

use crate::batch::{BatchOutcome, BatchReport};
use crate::error::WriteError;
use async_trait::async_trait;
use flowscribe_core::Result;
use flowscribe_docs::{render_document, render_inventory};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// File name of the inventory page.
pub const INVENTORY_FILE: &str = "README.md";
/// File name of the batch report.
pub const REPORT_FILE: &str = "batch-report.json";

/// Persists rendered artifacts.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Writes the markdown document of one workflow.
    async fn write_document(&self, slug: &str, markdown: &str) -> Result<(), WriteError>;

    /// Writes the inventory page.
    async fn write_inventory(&self, markdown: &str) -> Result<(), WriteError>;

    /// Writes the batch report.
    async fn write_report(&self, report: &BatchReport) -> Result<(), WriteError>;
}

/// Counts of written and failed artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

impl WriteSummary {
    fn record(&mut self, artifact: &str, result: Result<(), WriteError>) {
        match result {
            Ok(()) => self.written += 1,
            Err(err) => {
                warn!(artifact, error = %err, "failed to write artifact");
                self.failed += 1;
            }
        }
    }

    /// Returns true if every artifact was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Writes every document, the inventory and the report of a batch.
///
/// A failed artifact is logged and counted; the remaining ones are still
/// written.
pub async fn write_artifacts(writer: &dyn ArtifactWriter, outcome: &BatchOutcome) -> WriteSummary {
    let mut summary = WriteSummary::default();
    for document in &outcome.documents {
        let markdown = render_document(&document.model);
        summary.record(
            &document.slug,
            writer.write_document(&document.slug, &markdown).await,
        );
    }
    summary.record(
        INVENTORY_FILE,
        writer.write_inventory(&render_inventory(&outcome.inventory)).await,
    );
    summary.record(REPORT_FILE, writer.write_report(&outcome.report).await);

    info!(written = summary.written, failed = summary.failed, "artifacts written");
    summary
}

/// Writes artifacts into a directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    root: PathBuf,
}

impl FsArtifactWriter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_file(&self, file_name: &str, contents: &[u8]) -> Result<(), WriteError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| WriteError::CreateDirFailed {
                path: self.root.clone(),
                reason: err.to_string(),
            })?;

        let path = self.root.join(file_name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|err| WriteError::WriteFailed {
                path: path.clone(),
                reason: err.to_string(),
            })?;

        debug!(path = %path.display(), "wrote artifact");
        Ok(())
    }
}

#[async_trait]
impl ArtifactWriter for FsArtifactWriter {
    #[instrument(skip(self, markdown))]
    async fn write_document(&self, slug: &str, markdown: &str) -> Result<(), WriteError> {
        self.write_file(&format!("{slug}.md"), markdown.as_bytes()).await
    }

    #[instrument(skip_all)]
    async fn write_inventory(&self, markdown: &str) -> Result<(), WriteError> {
        self.write_file(INVENTORY_FILE, markdown.as_bytes()).await
    }

    #[instrument(skip_all, fields(batch = %report.id))]
    async fn write_report(&self, report: &BatchReport) -> Result<(), WriteError> {
        let mut json = serde_json::to_vec_pretty(report).map_err(|err| WriteError::SerializeFailed {
            artifact: "batch report".to_string(),
            reason: err.to_string(),
        })?;
        json.push(b'\n');
        self.write_file(REPORT_FILE, &json).await
    }
}
