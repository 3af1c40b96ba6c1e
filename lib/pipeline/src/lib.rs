//! Batch pipeline for flowscribe.
//!
//! Connects the pure model and rendering crates to the outside world:
//!
//! - **Source**: Lists raw workflow payloads and their run samples
//! - **Batch**: Runs the per-workflow pipeline on a bounded worker pool
//! - **Writer**: Persists documents, the inventory and the batch report

pub mod batch;
pub mod error;
pub mod source;
pub mod writer;

pub use batch::{
    BatchOptions, BatchOutcome, BatchReport, BatchRunner, RenderedDocument, ReportItem,
    WorkflowOutcome, default_workers, process_workflow, slug,
};
pub use error::{SourceError, WriteError};
pub use source::{FsWorkflowSource, SourceQuery, WorkflowInput, WorkflowSource};
pub use writer::{ArtifactWriter, FsArtifactWriter, WriteSummary, write_artifacts};
