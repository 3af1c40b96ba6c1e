//! Documentation rendering for flowscribe.
//!
//! Everything here is pure: the same definition, graph and run samples always
//! produce the same output.
//!
//! - **Diagram**: Validated graphs laid out as nested scope diagrams
//! - **Metrics**: Run samples reduced to per-status counts and a success rate
//! - **Document**: Per-workflow document model with a fixed section order
//! - **Inventory**: Sorted batch index with totals
//! - **Emitters**: Mermaid and markdown text

pub mod diagram;
pub mod document;
pub mod inventory;
pub mod markdown;
pub mod mermaid;
pub mod metrics;
pub mod sanitize;

pub use diagram::{Diagram, DiagramEdge, DiagramNode, DiagramRenderer, NodeShape, Region, ScopeDiagram};
pub use document::{
    DiagramSection, DocumentModel, DocumentRenderer, Property, Section, SectionBody, SectionKind,
    Table,
};
pub use inventory::{Inventory, InventoryEntry, InventoryTotals, ItemStatus};
pub use markdown::{render_document, render_inventory};
pub use mermaid::render_mermaid;
pub use metrics::{RunMetrics, SuccessRate};
