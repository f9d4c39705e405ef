//! Field-level lineage layered onto the entity graph.
//!
//! Field nodes are keyed by `object.column` and connected by
//! [`EdgeKind::Lineage`] edges. They never take part in name lookups or
//! root-node computation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use super::{EdgeKind, EntityGraph, FieldNode, GraphNode};

/// Direct neighbours of a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLineage {
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
}

impl EntityGraph {
    /// Add a field node, merging metadata into an existing one.
    pub fn add_field_node(
        &mut self,
        field_id: &str,
        metadata: Option<BTreeMap<String, serde_json::Value>>,
    ) -> NodeIndex {
        if let Some(&idx) = self.fields.get(field_id) {
            if let (Some(extra), GraphNode::Field(node)) = (metadata, &mut self.graph[idx]) {
                node.metadata.extend(extra);
            }
            return idx;
        }

        let idx = self.graph.add_node(GraphNode::Field(FieldNode {
            field_id: field_id.to_string(),
            metadata: metadata.unwrap_or_default(),
        }));
        self.fields.insert(field_id.to_string(), idx);
        idx
    }

    /// Connect two existing fields.
    ///
    /// Returns `false` without touching the graph when either end is missing.
    pub fn add_field_edge(&mut self, source: &str, target: &str) -> bool {
        let (Some(&from), Some(&to)) = (self.fields.get(source), self.fields.get(target)) else {
            return false;
        };
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, EdgeKind::Lineage);
        }
        true
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldNode> {
        self.fields
            .get(field_id)
            .and_then(|idx| self.graph[*idx].as_field())
    }

    /// Direct upstream and downstream fields, each sorted.
    pub fn field_lineage(&self, field_id: &str) -> FieldLineage {
        let Some(&idx) = self.fields.get(field_id) else {
            return FieldLineage::default();
        };
        FieldLineage {
            upstream: self.field_neighbors(idx, Direction::Incoming),
            downstream: self.field_neighbors(idx, Direction::Outgoing),
        }
    }

    fn field_neighbors(&self, idx: NodeIndex, dir: Direction) -> Vec<String> {
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(idx, dir)
            .filter_map(|n| self.graph[n].as_field())
            .map(|f| f.field_id.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Every field transitively downstream of `field_id`.
    ///
    /// `max_depth` limits the number of hops; the field itself is excluded.
    pub fn field_impact_analysis(&self, field_id: &str, max_depth: Option<usize>) -> BTreeSet<String> {
        let mut impacted = BTreeSet::new();
        let Some(&start) = self.fields.get(field_id) else {
            return impacted;
        };

        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                let Some(field) = self.graph[next].as_field() else {
                    continue;
                };
                if seen.insert(next) {
                    impacted.insert(field.field_id.clone());
                    queue.push_back((next, depth + 1));
                }
            }
        }
        impacted
    }

    /// Field ids belonging to `object_name`, sorted.
    pub fn fields_for_object(&self, object_name: &str) -> Vec<String> {
        let prefix = format!("{}.", object_name);
        let mut out: Vec<String> = self
            .fields
            .keys()
            .filter(|id| id.starts_with(&prefix))
            .cloned()
            .collect();
        out.sort();
        out
    }
}
