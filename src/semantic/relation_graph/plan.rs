//! Join plans: which model goes in FROM and in what order the rest join.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};

use super::{unique_models, JoinStep, RelationGraph};
use crate::semantic::error::{SemanticError, SemanticResult};

/// An ordered set of joins rooted at one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    pub from_model: String,
    pub joins: Vec<JoinStep>,
}

impl JoinPlan {
    /// Every model in the plan, FROM model first.
    pub fn models(&self) -> Vec<&str> {
        std::iter::once(self.from_model.as_str())
            .chain(self.joins.iter().map(|j| j.to.as_str()))
            .collect()
    }
}

impl RelationGraph {
    /// Join plan rooted at the most connected model of the spanning tree.
    ///
    /// Degree ties go to the model requested first.
    pub fn get_join_plan<S: AsRef<str>>(&self, models: &[S]) -> SemanticResult<JoinPlan> {
        let models = unique_models(models);
        let Some(first) = models.first() else {
            return Err(SemanticError::InvalidQuery("join plan needs at least one model".into()));
        };
        let first_idx = self.index_of(first)?;
        let tree = self.tree_edges(&models)?;

        let mut degree: BTreeMap<NodeIndex, usize> = BTreeMap::from([(first_idx, 0)]);
        for &edge in &tree {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                *degree.entry(a).or_default() += 1;
                *degree.entry(b).or_default() += 1;
            }
        }

        let rank = |idx: &NodeIndex| {
            let name = &self.graph[*idx];
            let requested = models.iter().position(|m| m == name).unwrap_or(usize::MAX);
            (std::cmp::Reverse(degree[idx]), requested, name.clone())
        };
        let root = degree.keys().min_by_key(|idx| rank(*idx)).copied().unwrap_or(first_idx);

        Ok(JoinPlan {
            from_model: self.graph[root].clone(),
            joins: self.walk_tree(root, &tree),
        })
    }

    /// Join plan with `root` in FROM, reaching every model in `models`.
    pub fn join_plan_from<S: AsRef<str>>(&self, root: &str, models: &[S]) -> SemanticResult<JoinPlan> {
        let mut ordered = vec![root.to_string()];
        ordered.extend(models.iter().map(|m| m.as_ref().to_string()));
        let ordered = unique_models(&ordered);

        let root_idx = self.index_of(root)?;
        let tree = self.tree_edges(&ordered)?;
        Ok(JoinPlan {
            from_model: root.to_string(),
            joins: self.walk_tree(root_idx, &tree),
        })
    }

    /// Edges of a tree connecting `models`, the first model included.
    fn tree_edges(&self, models: &[String]) -> SemanticResult<BTreeSet<EdgeIndex>> {
        for model in models {
            self.index_of(model)?;
        }
        match models {
            [] | [_] => return Ok(BTreeSet::new()),
            [a, b] => return Ok(self.shortest_path(a, b)?.into_iter().collect()),
            _ => {}
        }

        let mut union = BTreeSet::new();
        for (i, a) in models.iter().enumerate() {
            for b in &models[i + 1..] {
                match self.shortest_path(a, b) {
                    Ok(edges) => union.extend(edges),
                    Err(err) => {
                        tracing::debug!(from = %a, to = %b, error = %err, "skipping model pair");
                    }
                }
            }
        }

        let mut sub: UnGraph<NodeIndex, EdgeIndex> = UnGraph::default();
        let mut sub_nodes: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        for &edge in &union {
            let Some((a, b)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let sa = *sub_nodes.entry(a).or_insert_with(|| sub.add_node(a));
            let sb = *sub_nodes.entry(b).or_insert_with(|| sub.add_node(b));
            sub.add_edge(sa, sb, edge);
        }

        let tree: BTreeSet<EdgeIndex> = min_spanning_tree(&sub)
            .filter_map(|element| match element {
                Element::Edge { weight, .. } => Some(weight),
                Element::Node { .. } => None,
            })
            .collect();

        let root = self.index_of(&models[0])?;
        let reached: BTreeSet<String> = std::iter::once(self.graph[root].clone())
            .chain(self.walk_tree(root, &tree).into_iter().map(|step| step.to))
            .collect();
        let missing: Vec<String> = models
            .iter()
            .filter(|m| !reached.contains(*m))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SemanticError::NoJoinPath { models: missing });
        }
        Ok(tree)
    }

    /// Breadth-first join steps over `tree`, starting at `root`.
    fn walk_tree(&self, root: NodeIndex, tree: &BTreeSet<EdgeIndex>) -> Vec<JoinStep> {
        let mut steps = Vec::new();
        let mut seen = BTreeSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            for &edge in tree {
                let Some((a, b)) = self.graph.edge_endpoints(edge) else {
                    continue;
                };
                let next = match (a == node, b == node) {
                    (true, _) => b,
                    (_, true) => a,
                    _ => continue,
                };
                if !seen.insert(next) {
                    continue;
                }
                if let Some(step) = self.step(node, edge) {
                    steps.push(step);
                }
                queue.push_back(next);
            }
        }
        steps
    }
}
