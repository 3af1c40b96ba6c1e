//! Dependency graphs built with petgraph.
//!
//! Every scope of a workflow gets its own directed graph:
//! - Nodes are a synthetic start node, the triggers (root scope only) and
//!   the scope's steps
//! - Edges run from a predecessor to the step waiting on it
//!
//! Nested scopes never share a graph with their parent; the graphs form a
//! tree mirroring the step tree.

use crate::definition::WorkflowDefinition;
use crate::edge::DependencyEdge;
use crate::error::GraphError;
use crate::step::{ActionStep, Branch, Scope, ScopePath};
use crate::trigger::Trigger;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A node of a scope graph.
///
/// Positions index into the workflow's trigger list or the scope's step list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Start,
    Trigger { position: usize },
    Step { position: usize },
}

/// Sort key for the stable topological order: start, then triggers, then
/// steps, each by declaration index.
type Rank = (u8, usize, usize);

/// The validated dependency graph of one scope.
#[derive(Debug, Clone)]
pub struct ScopeGraph {
    path: ScopePath,
    graph: DiGraph<GraphNode, DependencyEdge>,
    /// Node indices in stable topological order.
    order: Vec<NodeIndex>,
    nested: Vec<NestedScope>,
}

/// The graph of a scope owned by a control-flow step.
#[derive(Debug, Clone)]
pub struct NestedScope {
    /// Name of the owning step in the parent scope.
    pub owner: String,
    pub branch: Branch,
    pub graph: ScopeGraph,
}

impl ScopeGraph {
    /// Builds and validates the graph of one scope, then its nested scopes.
    ///
    /// `triggers` must be empty for every scope but the root.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnresolvedReference`] if a step runs after a name
    /// not declared in this scope, or [`GraphError::CycleDetected`] if the
    /// dependencies are cyclic.
    pub fn build(scope: &Scope, triggers: &[Trigger], path: ScopePath) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let start = graph.add_node(GraphNode::Start);

        let trigger_nodes: Vec<NodeIndex> = (0..triggers.len())
            .map(|position| {
                let node = graph.add_node(GraphNode::Trigger { position });
                graph.add_edge(start, node, DependencyEdge::Entry);
                node
            })
            .collect();

        let step_nodes: Vec<NodeIndex> = (0..scope.steps.len())
            .map(|position| graph.add_node(GraphNode::Step { position }))
            .collect();

        let mut by_name: HashMap<&str, NodeIndex> = HashMap::new();
        for (step, &node) in scope.steps.iter().zip(&step_nodes) {
            by_name.entry(step.name.as_str()).or_insert(node);
        }

        for step in &scope.steps {
            if let Some(missing) = step
                .run_after
                .iter()
                .find(|dep| !by_name.contains_key(dep.step.as_str()))
            {
                return Err(GraphError::UnresolvedReference {
                    scope: path,
                    step: step.name.clone(),
                    reference: missing.step.clone(),
                });
            }
        }

        for (step, &node) in scope.steps.iter().zip(&step_nodes) {
            if step.run_after.is_empty() {
                if trigger_nodes.is_empty() {
                    graph.add_edge(start, node, DependencyEdge::Entry);
                } else {
                    for &trigger in &trigger_nodes {
                        graph.add_edge(trigger, node, DependencyEdge::Entry);
                    }
                }
                continue;
            }
            for dep in &step.run_after {
                let source = by_name[dep.step.as_str()];
                if graph.find_edge(source, node).is_none() {
                    graph.add_edge(source, node, DependencyEdge::from_run_after(dep));
                }
            }
        }

        let rank = |node: GraphNode| -> Rank {
            match node {
                GraphNode::Start => (0, 0, 0),
                GraphNode::Trigger { position } => {
                    (1, triggers[position].declaration_index, position)
                }
                GraphNode::Step { position } => {
                    (2, scope.steps[position].declaration_index, position)
                }
            }
        };

        let order = match stable_toposort(&graph, &rank) {
            Some(order) => order,
            None => {
                return Err(GraphError::CycleDetected {
                    path: cycle_path(&graph, &rank, scope),
                    scope: path,
                });
            }
        };

        let mut nested = Vec::new();
        for step in &scope.steps {
            for (branch, inner) in step.body.branches() {
                let child_path = path.child(&step.name, &branch);
                nested.push(NestedScope {
                    owner: step.name.clone(),
                    graph: ScopeGraph::build(inner, &[], child_path)?,
                    branch,
                });
            }
        }

        Ok(Self {
            path,
            graph,
            order,
            nested,
        })
    }

    /// The scope's location in the step tree.
    #[must_use]
    pub fn path(&self) -> &ScopePath {
        &self.path
    }

    /// Number of nodes, synthetic start included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in stable topological order; start is always first.
    pub fn nodes(&self) -> impl Iterator<Item = GraphNode> + '_ {
        self.order.iter().map(|&index| self.graph[index])
    }

    /// Step positions in stable topological order.
    #[must_use]
    pub fn ordered_steps(&self) -> Vec<usize> {
        self.nodes()
            .filter_map(|node| match node {
                GraphNode::Step { position } => Some(position),
                _ => None,
            })
            .collect()
    }

    /// Edges ordered by the topological position of source, then target.
    #[must_use]
    pub fn edges(&self) -> Vec<(GraphNode, GraphNode, &DependencyEdge)> {
        let position: HashMap<NodeIndex, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(pos, &index)| (index, pos))
            .collect();

        let mut edges: Vec<_> = self.graph.edge_references().collect();
        edges.sort_by_key(|edge| (position[&edge.source()], position[&edge.target()]));
        edges
            .into_iter()
            .map(|edge| (self.graph[edge.source()], self.graph[edge.target()], edge.weight()))
            .collect()
    }

    /// Nodes with no outgoing edges, in topological order.
    #[must_use]
    pub fn terminal_nodes(&self) -> Vec<GraphNode> {
        self.order
            .iter()
            .filter(|&&index| {
                self.graph
                    .edges_directed(index, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|&index| self.graph[index])
            .collect()
    }

    /// Graphs of the scopes owned by steps of this scope, in step order.
    #[must_use]
    pub fn nested(&self) -> &[NestedScope] {
        &self.nested
    }

    /// Looks up the graph of one nested scope.
    #[must_use]
    pub fn nested_scope(&self, owner: &str, branch: &Branch) -> Option<&ScopeGraph> {
        self.nested
            .iter()
            .find(|n| n.owner == owner && &n.branch == branch)
            .map(|n| &n.graph)
    }
}

/// Kahn's algorithm, always emitting the ready node with the lowest rank.
///
/// Returns `None` if some nodes never become ready (the graph is cyclic).
fn stable_toposort(
    graph: &DiGraph<GraphNode, DependencyEdge>,
    rank: &impl Fn(GraphNode) -> Rank,
) -> Option<Vec<NodeIndex>> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|index| graph.edges_directed(index, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<(Rank, NodeIndex)>> = graph
        .node_indices()
        .filter(|index| in_degree[index.index()] == 0)
        .map(|index| Reverse((rank(graph[index]), index)))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, index))) = ready.pop() {
        order.push(index);
        for successor in graph.neighbors_directed(index, Direction::Outgoing) {
            let degree = &mut in_degree[successor.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse((rank(graph[successor]), successor)));
            }
        }
    }

    (order.len() == graph.node_count()).then_some(order)
}

/// Names one cycle of a cyclic graph, deterministically.
///
/// Picks the strongly connected component holding the lowest-ranked cyclic
/// node and walks lowest-ranked successors inside it until a step repeats.
fn cycle_path(
    graph: &DiGraph<GraphNode, DependencyEdge>,
    rank: &impl Fn(GraphNode) -> Rank,
    scope: &Scope,
) -> Vec<String> {
    let name = |index: NodeIndex| match graph[index] {
        GraphNode::Step { position } => scope.steps[position].name.clone(),
        GraphNode::Trigger { position } => format!("trigger #{position}"),
        GraphNode::Start => "start".to_string(),
    };

    let Some(component) = petgraph::algo::tarjan_scc(graph)
        .into_iter()
        .filter(|c| c.len() > 1 || graph.contains_edge(c[0], c[0]))
        .min_by_key(|c| c.iter().map(|&i| rank(graph[i])).min())
    else {
        return Vec::new();
    };

    let members: HashSet<NodeIndex> = component.iter().copied().collect();
    let Some(mut current) = component.iter().copied().min_by_key(|&i| rank(graph[i])) else {
        return Vec::new();
    };

    let mut walk: Vec<NodeIndex> = Vec::new();
    loop {
        if let Some(pos) = walk.iter().position(|&seen| seen == current) {
            let mut path: Vec<String> = walk[pos..].iter().map(|&i| name(i)).collect();
            path.push(name(current));
            return path;
        }
        walk.push(current);
        let Some(next) = graph
            .neighbors_directed(current, Direction::Outgoing)
            .filter(|n| members.contains(n))
            .min_by_key(|&n| rank(graph[n]))
        else {
            return walk.iter().map(|&i| name(i)).collect();
        };
        current = next;
    }
}

/// The validated dependency graphs of a whole workflow.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    root: ScopeGraph,
}

/// A step together with the scope it is declared in.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedStep<'a> {
    pub path: ScopePath,
    pub step: &'a ActionStep,
}

impl WorkflowGraph {
    /// Builds and validates the graphs of every scope of a workflow.
    ///
    /// Scopes are validated root first, then nested scopes depth-first in
    /// step order; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphError`] found.
    pub fn build(definition: &WorkflowDefinition) -> Result<Self, GraphError> {
        let root = ScopeGraph::build(&definition.actions, &definition.triggers, ScopePath::root())?;
        Ok(Self { root })
    }

    /// The root scope's graph.
    #[must_use]
    pub fn root(&self) -> &ScopeGraph {
        &self.root
    }

    /// Every step of the workflow in diagram order.
    ///
    /// Each scope is listed in stable topological order, and the steps of a
    /// control-flow step's nested scopes follow it immediately, branch by
    /// branch.
    #[must_use]
    pub fn ordered_steps<'a>(&self, actions: &'a Scope) -> Vec<ScopedStep<'a>> {
        let mut out = Vec::new();
        collect_ordered(actions, &self.root, &mut out);
        out
    }
}

fn collect_ordered<'a>(scope: &'a Scope, graph: &ScopeGraph, out: &mut Vec<ScopedStep<'a>>) {
    for position in graph.ordered_steps() {
        let step = &scope.steps[position];
        out.push(ScopedStep {
            path: graph.path().clone(),
            step,
        });
        for (branch, inner) in step.body.branches() {
            if let Some(inner_graph) = graph.nested_scope(&step.name, &branch) {
                collect_ordered(inner, inner_graph, out);
            }
        }
    }
}

/// Every step of a scope tree in declaration order, depth-first.
///
/// Used when the dependency graph is invalid and no topological order exists.
#[must_use]
pub fn declaration_order(actions: &Scope) -> Vec<ScopedStep<'_>> {
    let mut out = Vec::new();
    collect_declared(actions, ScopePath::root(), &mut out);
    out
}

fn collect_declared<'a>(scope: &'a Scope, path: ScopePath, out: &mut Vec<ScopedStep<'a>>) {
    for step in &scope.steps {
        out.push(ScopedStep {
            path: path.clone(),
            step,
        });
        for (branch, inner) in step.body.branches() {
            collect_declared(inner, path.child(&step.name, &branch), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepBody, StepType};

    fn compose(name: &str, index: usize) -> ActionStep {
        ActionStep::new(name, StepType::Compose, index)
    }

    fn step_names(scope: &Scope, graph: &ScopeGraph) -> Vec<String> {
        graph
            .ordered_steps()
            .into_iter()
            .map(|p| scope.steps[p].name.clone())
            .collect()
    }

    #[test]
    fn steps_without_predecessors_hang_off_start() {
        let scope = Scope::new(vec![compose("A", 0), compose("B", 1).after("A")]);
        let graph = ScopeGraph::build(&scope, &[], ScopePath::root()).expect("build");

        assert_eq!(graph.node_count(), 3);
        let edges = graph.edges();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].0, GraphNode::Start);
        assert_eq!(edges[0].1, GraphNode::Step { position: 0 });
        assert_eq!(graph.terminal_nodes(), vec![GraphNode::Step { position: 1 }]);
    }

    #[test]
    fn root_steps_hang_off_every_trigger() {
        let triggers = vec![Trigger::new("t1", "Request", 0), Trigger::new("t2", "Recurrence", 1)];
        let scope = Scope::new(vec![compose("A", 0)]);
        let graph = ScopeGraph::build(&scope, &triggers, ScopePath::root()).expect("build");

        assert_eq!(graph.node_count(), 4);
        // start->t1, start->t2, t1->A, t2->A
        assert_eq!(graph.edge_count(), 4);
        let nodes: Vec<_> = graph.nodes().collect();
        assert_eq!(
            nodes,
            vec![
                GraphNode::Start,
                GraphNode::Trigger { position: 0 },
                GraphNode::Trigger { position: 1 },
                GraphNode::Step { position: 0 },
            ]
        );
    }

    #[test]
    fn topological_order_breaks_ties_by_declaration() {
        // Declared out of dependency order: C runs after A, B independent.
        let scope = Scope::new(vec![
            compose("C", 0).after("A"),
            compose("B", 1),
            compose("A", 2),
        ]);
        let graph = ScopeGraph::build(&scope, &[], ScopePath::root()).expect("build");
        assert_eq!(step_names(&scope, &graph), vec!["B", "A", "C"]);
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let scope = Scope::new(vec![compose("A", 0).after("Z")]);
        let err = ScopeGraph::build(&scope, &[], ScopePath::root()).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnresolvedReference {
                scope: ScopePath::root(),
                step: "A".to_string(),
                reference: "Z".to_string(),
            }
        );
    }

    #[test]
    fn unresolved_takes_precedence_over_cycle() {
        let scope = Scope::new(vec![
            compose("A", 0).after("B"),
            compose("B", 1).after("A").after("Missing"),
        ]);
        let err = ScopeGraph::build(&scope, &[], ScopePath::root()).unwrap_err();
        assert!(matches!(err, GraphError::UnresolvedReference { .. }));
    }

    #[test]
    fn two_step_cycle_is_named() {
        let scope = Scope::new(vec![compose("A", 0).after("B"), compose("B", 1).after("A")]);
        let err = ScopeGraph::build(&scope, &[], ScopePath::root()).unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                scope: ScopePath::root(),
                path: vec!["A".to_string(), "B".to_string(), "A".to_string()],
            }
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let scope = Scope::new(vec![compose("Loop", 0).after("Loop")]);
        let err = ScopeGraph::build(&scope, &[], ScopePath::root()).unwrap_err();
        match err {
            GraphError::CycleDetected { path, .. } => assert_eq!(path, vec!["Loop", "Loop"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cycle_in_nested_scope_names_the_scope() {
        let inner = Scope::new(vec![compose("X", 0).after("Y"), compose("Y", 1).after("X")]);
        let scope = Scope::new(vec![
            ActionStep::new("Each", StepType::Foreach, 0).with_body(StepBody::Loop { body: inner }),
        ]);
        let err = ScopeGraph::build(&scope, &[], ScopePath::root()).unwrap_err();
        assert_eq!(err.scope().to_string(), "Each/body");
    }

    #[test]
    fn nested_references_do_not_leak_between_scopes() {
        // X inside the loop cannot see the root step A.
        let inner = Scope::new(vec![compose("X", 0).after("A")]);
        let scope = Scope::new(vec![
            compose("A", 0),
            ActionStep::new("Each", StepType::Foreach, 1)
                .after("A")
                .with_body(StepBody::Loop { body: inner }),
        ]);
        let err = ScopeGraph::build(&scope, &[], ScopePath::root()).unwrap_err();
        assert!(matches!(err, GraphError::UnresolvedReference { ref reference, .. } if reference == "A"));
    }

    #[test]
    fn empty_scope_has_only_start() {
        let graph = ScopeGraph::build(&Scope::default(), &[], ScopePath::root()).expect("build");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.terminal_nodes(), vec![GraphNode::Start]);
    }

    #[test]
    fn ordered_steps_inline_nested_scopes() {
        let mut definition = WorkflowDefinition::new("wf", "rg");
        definition.actions = Scope::new(vec![
            compose("Last", 0).after("Check"),
            ActionStep::new("Check", StepType::Condition, 1).with_body(StepBody::Condition {
                if_true: Scope::new(vec![compose("X", 0)]),
                if_false: Scope::new(vec![compose("Y", 0)]),
            }),
        ]);

        let graph = WorkflowGraph::build(&definition).expect("build");
        let flat: Vec<_> = graph
            .ordered_steps(&definition.actions)
            .iter()
            .map(|s| (s.step.name.clone(), s.path.to_string()))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("Check".to_string(), "root".to_string()),
                ("X".to_string(), "Check/true".to_string()),
                ("Y".to_string(), "Check/false".to_string()),
                ("Last".to_string(), "root".to_string()),
            ]
        );

        let declared: Vec<_> = declaration_order(&definition.actions)
            .iter()
            .map(|s| s.step.name.clone())
            .collect();
        assert_eq!(declared, vec!["Last", "Check", "X", "Y"]);
    }
}
