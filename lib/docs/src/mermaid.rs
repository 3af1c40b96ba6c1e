//! Mermaid `flowchart` emitter for [`Diagram`]s.

use crate::diagram::{Diagram, DiagramEdge, DiagramNode, NodeShape, ScopeDiagram};

const INDENT: &str = "    ";

/// Serializes a diagram as a Mermaid `flowchart TD` block (without fences).
///
/// Nested scopes become subgraphs; the edge anchoring a subgraph is written
/// after it, in the parent's context.
#[must_use]
pub fn render_mermaid(diagram: &Diagram) -> String {
    let mut out = String::from("flowchart TD\n");
    write_scope(&mut out, &diagram.root, 1);
    out
}

fn write_scope(out: &mut String, scope: &ScopeDiagram, depth: usize) {
    let pad = INDENT.repeat(depth);
    for node in &scope.nodes {
        write_node(out, &pad, node);
    }
    for edge in &scope.edges {
        write_edge(out, &pad, edge);
    }
    for region in &scope.regions {
        out.push_str(&format!(
            "{pad}subgraph {}[\"{}\"]\n",
            region.diagram.id, region.diagram.title
        ));
        write_scope(out, &region.diagram, depth + 1);
        out.push_str(&format!("{pad}end\n"));
        write_edge(out, &pad, &region.anchor);
    }
}

fn write_node(out: &mut String, pad: &str, node: &DiagramNode) {
    let (open, close) = match node.shape {
        NodeShape::Terminal => ("([", "])"),
        NodeShape::Decision => ("{", "}"),
        NodeShape::Block => ("[[", "]]"),
        NodeShape::Process => ("[", "]"),
    };
    out.push_str(&format!("{pad}{}{open}\"{}\"{close}\n", node.id, node.label));
}

fn write_edge(out: &mut String, pad: &str, edge: &DiagramEdge) {
    let line = match &edge.label {
        Some(label) => format!("{pad}{} -->|\"{label}\"| {}\n", edge.from, edge.to),
        None => format!("{pad}{} --> {}\n", edge.from, edge.to),
    };
    out.push_str(&line);
}
