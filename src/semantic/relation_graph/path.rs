//! Shortest join paths between models.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use super::{unique_models, JoinStep, RelationGraph};
use crate::semantic::error::{SemanticError, SemanticResult};

/// Candidate paths listed in an ambiguity error.
const MAX_LISTED_PATHS: usize = 3;

/// Upper bound on enumerated equal-length paths.
const MAX_ENUMERATED_PATHS: usize = 32;

impl RelationGraph {
    /// Joins connecting `models`, starting from the first one.
    ///
    /// - zero or one model: no joins
    /// - two models: the unique shortest path between them
    /// - more: a spanning tree over pairwise shortest paths
    pub fn find_join_path<S: AsRef<str>>(&self, models: &[S]) -> SemanticResult<Vec<JoinStep>> {
        let models = unique_models(models);
        match models.as_slice() {
            [] | [_] => Ok(Vec::new()),
            [from, to] => {
                let start = self.index_of(from)?;
                let edges = self.shortest_path(from, to)?;
                Ok(self.walk_path(start, &edges))
            }
            [root, ..] => self.join_plan_from(root, &models).map(|plan| plan.joins),
        }
    }

    /// Edges of the single shortest path between two models.
    ///
    /// Ties are broken in favour of a path made only of default relations
    /// when exactly one such path exists.
    pub(crate) fn shortest_path(&self, from: &str, to: &str) -> SemanticResult<Vec<EdgeIndex>> {
        let start = self.index_of(from)?;
        let end = self.index_of(to)?;
        if start == end {
            return Ok(Vec::new());
        }

        let mut paths = self.shortest_paths(start, end);
        match paths.len() {
            0 => Err(SemanticError::NoJoinPath {
                models: vec![from.to_string(), to.to_string()],
            }),
            1 => Ok(paths.remove(0)),
            _ => {
                let defaults: Vec<&Vec<EdgeIndex>> = paths
                    .iter()
                    .filter(|p| p.iter().all(|e| self.graph[*e].is_default))
                    .collect();
                if let [only] = defaults.as_slice() {
                    return Ok((*only).clone());
                }
                Err(SemanticError::AmbiguousJoin {
                    from: from.to_string(),
                    to: to.to_string(),
                    paths: paths
                        .iter()
                        .take(MAX_LISTED_PATHS)
                        .map(|p| self.render_path(start, p))
                        .collect(),
                })
            }
        }
    }

    /// Every shortest path from `start` to `end`, as edge sequences.
    ///
    /// Parallel relations between the same two models count as distinct
    /// paths.
    fn shortest_paths(&self, start: NodeIndex, end: NodeIndex) -> Vec<Vec<EdgeIndex>> {
        let mut dist: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            if node == end {
                break;
            }
            let d = dist[&node];
            for next in self.graph.neighbors(node) {
                if !dist.contains_key(&next) {
                    dist.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        if !dist.contains_key(&end) {
            return Vec::new();
        }

        let mut out = Vec::new();
        let mut suffix = Vec::new();
        self.collect_paths(end, start, &dist, &mut suffix, &mut out);
        out
    }

    /// Walk back from `node` towards `start` along edges that lose one hop.
    fn collect_paths(
        &self,
        node: NodeIndex,
        start: NodeIndex,
        dist: &HashMap<NodeIndex, usize>,
        suffix: &mut Vec<EdgeIndex>,
        out: &mut Vec<Vec<EdgeIndex>>,
    ) {
        if out.len() >= MAX_ENUMERATED_PATHS {
            return;
        }
        if node == start {
            out.push(suffix.iter().rev().copied().collect());
            return;
        }
        let Some(&d) = dist.get(&node) else {
            return;
        };

        let mut back: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges(node)
            .map(|e| {
                let other = if e.source() == node { e.target() } else { e.source() };
                (e.id(), other)
            })
            .filter(|(_, prev)| d > 0 && dist.get(prev) == Some(&(d - 1)))
            .collect();
        back.sort();

        for (edge, prev) in back {
            suffix.push(edge);
            self.collect_paths(prev, start, dist, suffix, out);
            suffix.pop();
        }
    }

    /// Join steps for an edge sequence starting at `start`.
    pub(crate) fn walk_path(&self, start: NodeIndex, edges: &[EdgeIndex]) -> Vec<JoinStep> {
        let mut current = start;
        let mut steps = Vec::with_capacity(edges.len());
        for &edge in edges {
            let Some(step) = self.step(current, edge) else {
                break;
            };
            if let Some(&next) = self.node_indices.get(&step.to) {
                current = next;
            }
            steps.push(step);
        }
        steps
    }

    /// `a -[relation]- b -[relation]- c`
    fn render_path(&self, start: NodeIndex, edges: &[EdgeIndex]) -> String {
        let mut out = self.graph[start].clone();
        for step in self.walk_path(start, edges) {
            out.push_str(&format!(" -[{}]- {}", step.relation, step.to));
        }
        out
    }
}
