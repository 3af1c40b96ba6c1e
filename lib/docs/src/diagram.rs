//! Diagram descriptions built from validated dependency graphs.
//!
//! A [`Diagram`] is a tree of [`ScopeDiagram`]s, one per scope. Each scope
//! is bounded by synthetic start and end nodes; nested scopes are regions
//! anchored at their owning control-flow node by a labelled edge.
//!
//! Node order follows the graph's stable topological order, so the same
//! definition always yields the same diagram.

use crate::sanitize::{IdAllocator, sanitize_label};
use flowscribe_workflow::{
    Branch, GraphNode, Scope, ScopeGraph, StepType, Trigger, WorkflowDefinition, WorkflowGraph,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a node is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    /// Synthetic start/end.
    Terminal,
    /// Triggers, conditions and switches.
    Decision,
    /// Loops.
    Block,
    /// Every other step.
    Process,
}

impl NodeShape {
    /// Shape for a step of the given type.
    #[must_use]
    pub fn for_step(step_type: &StepType) -> Self {
        match step_type {
            StepType::Condition | StepType::Switch => Self::Decision,
            StepType::Foreach | StepType::Until => Self::Block,
            _ => Self::Process,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramNode {
    /// Identifier, unique within the diagram; `[A-Za-z0-9_]` only.
    pub id: String,
    /// Sanitized label.
    pub label: String,
    pub shape: NodeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub from: String,
    pub to: String,
    /// Sanitized label, if any.
    pub label: Option<String>,
}

/// A nested scope drawn as a region, with the edge that enters it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Edge from the owning control-flow node to the region's start.
    pub anchor: DiagramEdge,
    pub diagram: ScopeDiagram,
}

/// The diagram of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDiagram {
    /// Region identifier; unique within the diagram.
    pub id: String,
    /// Sanitized region title.
    pub title: String,
    /// Id of the synthetic start node (first in `nodes`).
    pub start: String,
    /// Id of the synthetic end node (last in `nodes`).
    pub end: String,
    pub nodes: Vec<DiagramNode>,
    /// Edges between this scope's own nodes.
    pub edges: Vec<DiagramEdge>,
    pub regions: Vec<Region>,
}

impl ScopeDiagram {
    /// Counts nodes in this scope and every nested region.
    #[must_use]
    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
            + self
                .regions
                .iter()
                .map(|r| r.diagram.total_nodes())
                .sum::<usize>()
    }
}

/// A complete workflow diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagram {
    pub root: ScopeDiagram,
}

/// Lays out validated graphs as diagrams.
#[derive(Debug, Default)]
pub struct DiagramRenderer {
    ids: IdAllocator,
}

impl DiagramRenderer {
    /// Renders the diagram of a workflow whose graph has been validated.
    #[must_use]
    pub fn render(definition: &WorkflowDefinition, graph: &WorkflowGraph) -> Diagram {
        let mut renderer = Self::default();
        let root = renderer.render_scope(
            &definition.actions,
            &definition.triggers,
            graph.root(),
            ScopeNames {
                region: "workflow".to_string(),
                title: definition.name.clone(),
                start: "flow_start".to_string(),
                end: "flow_end".to_string(),
            },
        );
        Diagram { root }
    }

    fn render_scope(
        &mut self,
        scope: &Scope,
        triggers: &[Trigger],
        graph: &ScopeGraph,
        names: ScopeNames,
    ) -> ScopeDiagram {
        let region_id = self.ids.allocate(&names.region);
        let mut ids: HashMap<GraphNode, String> = HashMap::new();
        let mut nodes = Vec::with_capacity(graph.node_count() + 1);

        for node in graph.nodes() {
            let (raw_id, label, shape) = match node {
                GraphNode::Start => (names.start.clone(), "Start".to_string(), NodeShape::Terminal),
                GraphNode::Trigger { position } => {
                    let trigger = &triggers[position];
                    (trigger.name.clone(), trigger.name.clone(), NodeShape::Decision)
                }
                GraphNode::Step { position } => {
                    let step = &scope.steps[position];
                    (
                        step.name.clone(),
                        step.name.clone(),
                        NodeShape::for_step(&step.step_type),
                    )
                }
            };
            let id = self.ids.allocate(&raw_id);
            ids.insert(node, id.clone());
            nodes.push(DiagramNode {
                id,
                label: sanitize_label(&label),
                shape,
            });
        }

        let end = self.ids.allocate(&names.end);
        nodes.push(DiagramNode {
            id: end.clone(),
            label: "End".to_string(),
            shape: NodeShape::Terminal,
        });

        let mut edges: Vec<DiagramEdge> = graph
            .edges()
            .into_iter()
            .map(|(from, to, edge)| DiagramEdge {
                from: ids[&from].clone(),
                to: ids[&to].clone(),
                label: edge.label().map(|l| sanitize_label(&l)),
            })
            .collect();
        edges.extend(graph.terminal_nodes().into_iter().map(|sink| DiagramEdge {
            from: ids[&sink].clone(),
            to: end.clone(),
            label: None,
        }));

        let mut regions = Vec::new();
        for position in graph.ordered_steps() {
            let step = &scope.steps[position];
            let owner_id = ids[&GraphNode::Step { position }].clone();
            for (branch, inner) in step.body.branches() {
                let Some(inner_graph) = graph.nested_scope(&step.name, &branch) else {
                    continue;
                };
                let prefix = format!("{owner_id}_{}", branch.key());
                let diagram = self.render_scope(
                    inner,
                    &[],
                    inner_graph,
                    ScopeNames {
                        region: prefix.clone(),
                        title: region_title(&step.name, &branch),
                        start: format!("{prefix}_start"),
                        end: format!("{prefix}_end"),
                    },
                );
                regions.push(Region {
                    anchor: DiagramEdge {
                        from: owner_id.clone(),
                        to: diagram.start.clone(),
                        label: branch.edge_label().map(sanitize_label),
                    },
                    diagram,
                });
            }
        }

        ScopeDiagram {
            id: region_id,
            title: sanitize_label(&names.title),
            start: ids[&GraphNode::Start].clone(),
            end,
            nodes,
            edges,
            regions,
        }
    }
}

/// Raw names for one scope's region and synthetic nodes.
struct ScopeNames {
    region: String,
    title: String,
    start: String,
    end: String,
}

fn region_title(owner: &str, branch: &Branch) -> String {
    match branch {
        Branch::Body => owner.to_string(),
        Branch::Case { value, .. } => format!("{owner}: case {value}"),
        other => format!("{owner}: {}", other.key()),
    }
}
