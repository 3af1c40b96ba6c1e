//! Markdown emitters for documents and the inventory.
//!
//! Cells of a [`DocumentModel`] are already escaped and copied verbatim;
//! inventory text is escaped here.

use crate::document::{DocumentModel, Property, SectionBody, Table};
use crate::inventory::Inventory;
use crate::mermaid::render_mermaid;
use crate::sanitize::escape_markdown;

/// Title of the inventory page.
pub const INVENTORY_TITLE: &str = "Workflow inventory";

/// Renders one workflow document.
#[must_use]
pub fn render_document(document: &DocumentModel) -> String {
    let mut out = format!("# {}\n", document.title);
    for section in &document.sections {
        out.push_str(&format!("\n## {}\n\n", section.heading));
        match &section.body {
            SectionBody::Properties(properties) => write_properties(&mut out, properties),
            SectionBody::Table(table) => write_table(&mut out, table),
            SectionBody::Diagram(diagram) => {
                out.push_str("```mermaid\n");
                out.push_str(&render_mermaid(diagram));
                out.push_str("```\n");
            }
            SectionBody::Notice(text) => {
                out.push_str(&format!("> {text}\n"));
            }
        }
    }
    out
}

/// Renders the batch inventory: totals, then one row per workflow.
///
/// Documented workflows link to `<link>.md`.
#[must_use]
pub fn render_inventory(inventory: &Inventory) -> String {
    let totals = &inventory.totals;
    let mut out = format!("# {INVENTORY_TITLE}\n\n## Totals\n\n");
    let rows = [
        ("Workflows", totals.workflows),
        ("Enabled", totals.enabled),
        ("Disabled", totals.disabled),
        ("Suspended", totals.suspended),
        ("Unknown state", totals.unknown),
        ("Triggers", totals.triggers),
        ("Actions", totals.actions),
        ("Degraded", totals.degraded),
        ("Skipped", totals.skipped),
    ];
    out.push_str("| Metric | Count |\n| --- | --- |\n");
    for (name, count) in rows {
        out.push_str(&format!("| {name} | {count} |\n"));
    }

    out.push_str("\n## Workflows\n\n");
    let mut table = Table {
        columns: ["Name", "Resource group", "State", "Triggers", "Actions", "Status"]
            .iter()
            .map(|c| (*c).to_string())
            .collect(),
        rows: Vec::new(),
    };
    for entry in &inventory.entries {
        let name = escape_markdown(&entry.name);
        let name = match &entry.link {
            Some(link) => format!("[{name}]({link}.md)"),
            None => name,
        };
        let scope = if entry.scope_id.is_empty() {
            "-".to_string()
        } else {
            escape_markdown(&entry.scope_id)
        };
        table.rows.push(vec![
            name,
            scope,
            entry.state.to_string(),
            entry.trigger_count.to_string(),
            entry.action_count.to_string(),
            escape_markdown(&entry.status.to_string()),
        ]);
    }
    write_table(&mut out, &table);
    out
}

fn write_properties(out: &mut String, properties: &[Property]) {
    out.push_str("| Property | Value |\n| --- | --- |\n");
    for property in properties {
        out.push_str(&format!("| {} | {} |\n", property.name, property.value));
    }
}

fn write_table(out: &mut String, table: &Table) {
    if table.rows.is_empty() {
        out.push_str("*None*\n");
        return;
    }
    out.push_str(&table_row(&table.columns));
    out.push_str(&table_row(&vec!["---"; table.columns.len()]));
    for row in &table.rows {
        out.push_str(&table_row(row));
    }
}

fn table_row<S: AsRef<str>>(cells: &[S]) -> String {
    let cells: Vec<&str> = cells.iter().map(|cell| cell.as_ref()).collect();
    format!("| {} |\n", cells.join(" | "))
}
