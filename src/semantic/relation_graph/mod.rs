//! RelationGraph - models connected by declared relations.
//!
//! Nodes are models, edges are relations. The graph is undirected for path
//! finding, but each edge remembers which model its condition names first
//! so join types can be flipped when a join walks the edge backwards.
//!
//! The module is organized into submodules:
//! - `path`: shortest join paths and ambiguity detection
//! - `plan`: multi-model spanning trees and ordered join plans

mod path;
mod plan;

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

pub use plan::JoinPlan;

use super::error::{SemanticError, SemanticResult};
use super::refs;
use super::sanitize::{NameSanitizer, CTE_SUFFIX};
use crate::model::Project;
use crate::sql::query::JoinType;

/// A relation resolved against the models in scope.
#[derive(Debug, Clone)]
pub struct RelationEdge {
    pub name: String,
    /// First model named by the condition.
    pub left: String,
    pub right: String,
    /// Condition as declared, with `${ref(...)}` tokens.
    pub condition: String,
    /// Condition with model references rewritten to CTE aliases.
    pub resolved_condition: String,
    pub join_type: JoinType,
    pub is_default: bool,
}

/// One join between two models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// Model already in the query.
    pub from: String,
    /// Model being joined.
    pub to: String,
    pub condition: String,
    /// Join type as seen from `from`.
    pub join_type: JoinType,
    pub relation: String,
}

/// Undirected graph of models and relations.
#[derive(Debug, Clone)]
pub struct RelationGraph {
    pub(crate) graph: UnGraph<String, RelationEdge>,
    pub(crate) node_indices: HashMap<String, NodeIndex>,
}

impl RelationGraph {
    /// Build the graph with conditions rewritten to `{model}_cte.{field}`.
    ///
    /// `relevant` limits the graph to a subset of models; relations touching
    /// any other model are skipped.
    pub fn new(project: &Project, sanitizer: &NameSanitizer, relevant: Option<&BTreeSet<String>>) -> Self {
        Self::with_alias_suffix(project, sanitizer, CTE_SUFFIX, relevant)
    }

    /// Build the graph with a custom CTE alias suffix.
    pub fn with_alias_suffix(
        project: &Project,
        sanitizer: &NameSanitizer,
        suffix: &str,
        relevant: Option<&BTreeSet<String>>,
    ) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut node_indices = HashMap::new();

        for model in &project.models {
            if relevant.is_some_and(|r| !r.contains(&model.name)) {
                continue;
            }
            let idx = graph.add_node(model.name.clone());
            node_indices.insert(model.name.clone(), idx);
        }

        for relation in &project.relations {
            let Some((left, right)) = relation.model_pair() else {
                tracing::warn!(
                    relation = %relation.name,
                    "relation condition must reference exactly two models"
                );
                continue;
            };
            let (Some(&l), Some(&r)) = (node_indices.get(&left), node_indices.get(&right)) else {
                tracing::debug!(relation = %relation.name, %left, %right, "relation out of scope");
                continue;
            };

            let resolved_condition = refs::replace_refs(&relation.condition, |entity, path| {
                let alias = sanitizer.get_alias(entity, suffix);
                match path {
                    Some(p) => format!("{}.{}", alias, p),
                    None => alias,
                }
            });

            graph.add_edge(
                l,
                r,
                RelationEdge {
                    name: relation.name.clone(),
                    left,
                    right,
                    condition: relation.condition.clone(),
                    resolved_condition,
                    join_type: relation.join_type,
                    is_default: relation.is_default,
                },
            );
        }

        Self {
            graph,
            node_indices,
        }
    }

    pub(crate) fn index_of(&self, model: &str) -> SemanticResult<NodeIndex> {
        self.node_indices
            .get(model)
            .copied()
            .ok_or_else(|| SemanticError::NoJoinPath {
                models: vec![model.to_string()],
            })
    }

    /// Join step for walking `edge` away from `from`.
    pub(crate) fn step(&self, from: NodeIndex, edge: EdgeIndex) -> Option<JoinStep> {
        let (a, b) = self.graph.edge_endpoints(edge)?;
        let to = if a == from { b } else { a };
        let rel = &self.graph[edge];
        let from_name = &self.graph[from];
        let join_type = if *from_name == rel.left {
            rel.join_type
        } else {
            rel.join_type.flipped()
        };
        Some(JoinStep {
            from: from_name.clone(),
            to: self.graph[to].clone(),
            condition: rel.resolved_condition.clone(),
            join_type,
            relation: rel.name.clone(),
        })
    }

    /// Relations between two models, in declaration order.
    pub fn relations_between(&self, a: &str, b: &str) -> Vec<&RelationEdge> {
        let (Some(&a), Some(&b)) = (self.node_indices.get(a), self.node_indices.get(b)) else {
            return Vec::new();
        };
        let mut edges: Vec<EdgeIndex> = self.graph.edges_connecting(a, b).map(|e| e.id()).collect();
        edges.sort();
        edges.into_iter().map(|e| &self.graph[e]).collect()
    }

    /// Every model reachable from `model`, excluding itself.
    pub fn get_connected_models(&self, model: &str) -> BTreeSet<String> {
        let Some(&start) = self.node_indices.get(model) else {
            return BTreeSet::new();
        };
        self.component(start)
            .into_iter()
            .filter(|idx| *idx != start)
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    fn component(&self, start: NodeIndex) -> BTreeSet<NodeIndex> {
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors(node) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Non-fatal structural warnings: isolated models, disconnected groups.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut seen = BTreeSet::new();

        for idx in self.graph.node_indices() {
            if seen.contains(&idx) {
                continue;
            }
            let component = self.component(idx);
            seen.extend(component.iter().copied());
            if component.len() == 1 {
                warnings.push(format!("Model '{}' has no relations", self.graph[idx]));
            } else {
                let mut names: Vec<String> = component.iter().map(|i| self.graph[*i].clone()).collect();
                names.sort();
                groups.push(names);
            }
        }

        if groups.len() > 1 {
            let rendered: Vec<String> = groups.iter().map(|g| g.join(", ")).collect();
            warnings.push(format!(
                "Models form {} disconnected groups: [{}]",
                groups.len(),
                rendered.join("] [")
            ));
        }
        warnings
    }

    pub fn model_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.node_indices.contains_key(model)
    }
}

/// Deduplicate while keeping first-seen order.
pub(crate) fn unique_models<S: AsRef<str>>(models: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in models {
        if !out.iter().any(|o| o == m.as_ref()) {
            out.push(m.as_ref().to_string());
        }
    }
    out
}
