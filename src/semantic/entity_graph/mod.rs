//! EntityGraph - directed graph over every typed entity of a project.
//!
//! Edges point from an entity to what it needs: a project owns its models,
//! a model owns its metrics and reads from its source, a metric references
//! the metrics and models named in its expression, and so on.
//!
//! The module is organized into submodules:
//! - `lineage`: field-level lineage nodes layered onto the same graph
//! - `filter`: `[N+]name[+N]` selection of sub-graphs

mod filter;
mod lineage;


use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

pub use lineage::FieldLineage;

use super::error::{SemanticError, SemanticResult};
use super::refs;
use crate::model::Project;

/// Kind of a named project entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Project,
    Source,
    Model,
    Metric,
    Dimension,
    Relation,
    Trace,
    Chart,
    Dashboard,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Source => "source",
            EntityKind::Model => "model",
            EntityKind::Metric => "metric",
            EntityKind::Dimension => "dimension",
            EntityKind::Relation => "relation",
            EntityKind::Trace => "trace",
            EntityKind::Chart => "chart",
            EntityKind::Dashboard => "dashboard",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named project entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityNode {
    pub name: String,
    pub kind: EntityKind,
}

impl EntityNode {
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A single column of some entity, identified as `object.column`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub field_id: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A node in the entity graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    Entity(EntityNode),
    Field(FieldNode),
}

impl GraphNode {
    /// Entity name, or the field id for field nodes.
    pub fn label(&self) -> &str {
        match self {
            GraphNode::Entity(e) => &e.name,
            GraphNode::Field(f) => &f.field_id,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityNode> {
        match self {
            GraphNode::Entity(e) => Some(e),
            GraphNode::Field(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldNode> {
        match self {
            GraphNode::Field(f) => Some(f),
            GraphNode::Entity(_) => None,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self, GraphNode::Field(_))
    }
}

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Parent owns the child (project -> model, model -> metric).
    Owns,
    /// Parent names the child through a reference.
    References,
    /// Column-level lineage between two field nodes.
    Lineage,
}

/// A child declared by an entity before references are resolved.
enum Pending {
    Owned(NodeIndex),
    /// Raw reference text: `${ref(name)}` tokens or a bare name.
    Reference(String),
}

/// Directed graph of project entities plus optional field lineage.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    pub(crate) graph: DiGraph<GraphNode, EdgeKind>,

    /// Entity name to every node carrying it, in insertion order.
    pub(crate) names: HashMap<String, Vec<NodeIndex>>,

    /// Field id to its node.
    pub(crate) fields: HashMap<String, NodeIndex>,
}

impl EntityGraph {
    /// Build the graph for a project.
    ///
    /// Owned children are added first; references are resolved afterwards
    /// against the whole graph. A reference must match exactly one entity,
    /// preferring entities owned by the same parent and then top-level
    /// entities when a name is shared.
    pub fn build(project: &Project) -> SemanticResult<Self> {
        let mut this = EntityGraph::default();
        let mut pending: Vec<(NodeIndex, Vec<Pending>)> = Vec::new();

        let root_name = if project.name.is_empty() {
            "project"
        } else {
            project.name.as_str()
        };
        let root = this.add_entity(root_name, EntityKind::Project);
        let mut root_children = Vec::new();

        for source in &project.sources {
            let idx = this.add_entity(&source.name, EntityKind::Source);
            root_children.push(Pending::Owned(idx));
        }

        for model in &project.models {
            let idx = this.add_entity(&model.name, EntityKind::Model);
            root_children.push(Pending::Owned(idx));

            let mut children = Vec::new();
            if let Some(source) = &model.source {
                children.push(Pending::Reference(source.clone()));
            }
            for metric in &model.metrics {
                let m = this.add_entity(&metric.name, EntityKind::Metric);
                children.push(Pending::Owned(m));
                pending.push((m, expression_refs(&metric.expression)));
            }
            for dim in model.all_dimensions() {
                let d = this.add_entity(&dim.name, EntityKind::Dimension);
                children.push(Pending::Owned(d));
                pending.push((d, expression_refs(&dim.expression)));
            }
            pending.push((idx, children));
        }

        for dim in &project.dimensions {
            let idx = this.add_entity(&dim.name, EntityKind::Dimension);
            root_children.push(Pending::Owned(idx));
            pending.push((idx, expression_refs(&dim.expression)));
        }

        for metric in &project.metrics {
            let idx = this.add_entity(&metric.name, EntityKind::Metric);
            root_children.push(Pending::Owned(idx));
            pending.push((idx, expression_refs(&metric.expression)));
        }

        for relation in &project.relations {
            let idx = this.add_entity(&relation.name, EntityKind::Relation);
            root_children.push(Pending::Owned(idx));
            pending.push((idx, expression_refs(&relation.condition)));
        }

        for trace in &project.traces {
            let idx = this.add_entity(&trace.name, EntityKind::Trace);
            root_children.push(Pending::Owned(idx));
            pending.push((idx, vec![Pending::Reference(trace.model.clone())]));
        }

        for chart in &project.charts {
            let idx = this.add_entity(&chart.name, EntityKind::Chart);
            root_children.push(Pending::Owned(idx));
            let children = chart.traces.iter().cloned().map(Pending::Reference).collect();
            pending.push((idx, children));
        }

        for dashboard in &project.dashboards {
            let idx = this.add_entity(&dashboard.name, EntityKind::Dashboard);
            root_children.push(Pending::Owned(idx));
            let children = dashboard.charts.iter().cloned().map(Pending::Reference).collect();
            pending.push((idx, children));
        }

        pending.insert(0, (root, root_children));

        // Ownership first so sibling lookups see every owner.
        for (parent, children) in &pending {
            for child in children {
                if let Pending::Owned(idx) = child {
                    this.graph.add_edge(*parent, *idx, EdgeKind::Owns);
                }
            }
        }

        for (parent, children) in &pending {
            for child in children {
                if let Pending::Reference(text) = child {
                    this.add_references(*parent, text)?;
                }
            }
        }

        Ok(this)
    }

    fn add_entity(&mut self, name: &str, kind: EntityKind) -> NodeIndex {
        let idx = self
            .graph
            .add_node(GraphNode::Entity(EntityNode::new(name, kind)));
        self.names.entry(name.to_string()).or_default().push(idx);
        idx
    }

    fn add_references(&mut self, parent: NodeIndex, text: &str) -> SemanticResult<()> {
        let tokens = refs::tokenize(text);
        let targets: Vec<(String, String)> = if tokens.is_empty() {
            vec![(text.trim().to_string(), text.to_string())]
        } else {
            tokens
                .into_iter()
                .map(|t| (t.entity.clone(), text[t.span].to_string()))
                .collect()
        };

        for (name, raw) in targets {
            let target = self.resolve_reference(parent, &name, &raw)?;
            // A metric naming its own model is already covered by ownership.
            if self.owner(parent) == Some(target) {
                continue;
            }
            if self.graph.find_edge(parent, target).is_none() {
                self.graph.add_edge(parent, target, EdgeKind::References);
            }
        }
        Ok(())
    }

    fn resolve_reference(&self, parent: NodeIndex, name: &str, raw: &str) -> SemanticResult<NodeIndex> {
        let candidates = self.indices_named(name);
        if candidates.len() == 1 {
            return Ok(candidates[0]);
        }

        let bad_reference = || SemanticError::BadReference {
            parent: self.graph[parent].label().to_string(),
            reference: raw.to_string(),
            matches: candidates.len(),
        };
        if candidates.is_empty() {
            return Err(bad_reference());
        }

        let parent_owner = self.owner(parent);
        let siblings: Vec<NodeIndex> = candidates
            .iter()
            .copied()
            .filter(|c| parent_owner.is_some() && self.owner(*c) == parent_owner)
            .collect();
        if let [only] = siblings.as_slice() {
            return Ok(*only);
        }

        let top_level: Vec<NodeIndex> = candidates
            .iter()
            .copied()
            .filter(|c| {
                self.owner(*c)
                    .and_then(|o| self.entity(o))
                    .is_some_and(|o| o.kind == EntityKind::Project)
            })
            .collect();
        if let [only] = top_level.as_slice() {
            return Ok(*only);
        }

        Err(bad_reference())
    }

    /// Check the graph is acyclic.
    ///
    /// On failure the error carries the cycle path, first node repeated at
    /// the end (`a -> b -> a`).
    pub fn validate(&self) -> SemanticResult<()> {
        match self.find_cycle() {
            Some(cycle) => Err(SemanticError::CyclicGraph(cycle)),
            None => Ok(()),
        }
    }

    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            graph: &DiGraph<GraphNode, EdgeKind>,
            node: NodeIndex,
            marks: &mut [Mark],
            stack: &mut Vec<NodeIndex>,
        ) -> Option<Vec<String>> {
            marks[node.index()] = Mark::Active;
            stack.push(node);

            let mut next: Vec<NodeIndex> = graph.neighbors(node).collect();
            next.sort();
            for succ in next {
                match marks[succ.index()] {
                    Mark::Active => {
                        let start = stack.iter().position(|n| *n == succ).unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|n| graph[*n].label().to_string())
                            .collect();
                        path.push(graph[succ].label().to_string());
                        return Some(path);
                    }
                    Mark::New => {
                        if let Some(cycle) = visit(graph, succ, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }

            stack.pop();
            marks[node.index()] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::New; self.graph.node_count()];
        let mut stack = Vec::new();
        for node in self.graph.node_indices() {
            if marks[node.index()] == Mark::New {
                if let Some(cycle) = visit(&self.graph, node, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn node(&self, idx: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(idx)
    }

    pub fn entity(&self, idx: NodeIndex) -> Option<&EntityNode> {
        self.node(idx).and_then(GraphNode::as_entity)
    }

    /// Every node carrying `name`, in insertion order.
    pub fn indices_named(&self, name: &str) -> &[NodeIndex] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First entity with the given name.
    pub fn node_by_name(&self, name: &str) -> Option<&EntityNode> {
        self.indices_named(name)
            .first()
            .and_then(|idx| self.entity(*idx))
    }

    /// Entities of the given kinds, in insertion order.
    pub fn nodes_by_types(&self, kinds: &[EntityKind]) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|idx| self.entity(*idx).is_some_and(|e| kinds.contains(&e.kind)))
            .collect()
    }

    /// Entities with no incoming edge from another entity.
    pub fn root_nodes(&self) -> Vec<&EntityNode> {
        self.graph
            .node_indices()
            .filter(|idx| {
                self.entity(*idx).is_some()
                    && self
                        .graph
                        .neighbors_directed(*idx, Direction::Incoming)
                        .all(|p| self.graph[p].is_field())
            })
            .filter_map(|idx| self.entity(idx))
            .collect()
    }

    /// Direct parents, sorted by index.
    pub fn predecessors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(idx, Direction::Incoming)
    }

    /// Direct children, sorted by index.
    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(idx, Direction::Outgoing)
    }

    fn sorted_neighbors(&self, idx: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        out.sort();
        out.dedup();
        out
    }

    /// The entity owning `idx`, if any.
    pub fn owner(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .find(|e| *e.weight() == EdgeKind::Owns)
            .map(|e| e.source())
    }

    /// Name of the model owning a metric or dimension node.
    pub fn owning_model(&self, idx: NodeIndex) -> Option<&str> {
        self.owner(idx)
            .and_then(|o| self.entity(o))
            .filter(|e| e.kind == EntityKind::Model)
            .map(|e| e.name.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // =========================================================================
    // Sub-graphs
    // =========================================================================

    /// Copy of the graph restricted to `keep`, edges between kept nodes included.
    pub fn subgraph(&self, keep: &std::collections::BTreeSet<NodeIndex>) -> EntityGraph {
        let graph = self.graph.filter_map(
            |idx, node| keep.contains(&idx).then(|| node.clone()),
            |_, edge| Some(*edge),
        );
        Self::from_graph(graph)
    }

    /// Copy of the graph with every field node removed.
    pub fn named_subgraph(&self) -> EntityGraph {
        let keep = self
            .graph
            .node_indices()
            .filter(|idx| !self.graph[*idx].is_field())
            .collect();
        self.subgraph(&keep)
    }

    fn from_graph(graph: DiGraph<GraphNode, EdgeKind>) -> EntityGraph {
        let mut names: HashMap<String, Vec<NodeIndex>> = HashMap::new();
        let mut fields = HashMap::new();
        for idx in graph.node_indices() {
            match &graph[idx] {
                GraphNode::Entity(e) => names.entry(e.name.clone()).or_default().push(idx),
                GraphNode::Field(f) => {
                    fields.insert(f.field_id.clone(), idx);
                }
            }
        }
        EntityGraph {
            graph,
            names,
            fields,
        }
    }

    /// Labels of every node, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .graph
            .node_weights()
            .map(|n| n.label().to_string())
            .collect();
        out.sort();
        out
    }
}

/// References declared by an expression, as pending children.
fn expression_refs(expression: &str) -> Vec<Pending> {
    if refs::has_pattern(expression) {
        vec![Pending::Reference(expression.to_string())]
    } else {
        Vec::new()
    }
}
