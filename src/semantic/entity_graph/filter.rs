//! Sub-graph selection with the `[N+]name[+N]` filter grammar.
//!
//! ```text
//! orders        the node alone
//! +orders       all ancestors of orders, and orders
//! 2+orders      ancestors up to two levels up
//! orders+       all descendants
//! +orders+1     all ancestors, children one level down
//! a, b+         several clauses, comma separated
//! ```
//!
//! Distances are shortest-path hop counts. Clauses whose node sets
//! overlap are merged into one sub-graph.

use std::collections::{BTreeSet, VecDeque};
use std::sync::LazyLock;

use petgraph::graph::NodeIndex;
use petgraph::Direction;
use regex::Regex;

use super::EntityGraph;
use crate::semantic::error::{SemanticError, SemanticResult};

static CLAUSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d*)\+)?(.+?)(?:\+(\d*))?$").expect("filter clause pattern is valid")
});

/// How far to walk from the named node in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    None,
    Levels(usize),
    All,
}

/// One parsed filter clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub name: String,
    pub ancestors: Depth,
    pub descendants: Depth,
}

fn parse_depth(marker: Option<regex::Match<'_>>) -> SemanticResult<Depth> {
    match marker.map(|m| m.as_str()) {
        None => Ok(Depth::None),
        Some("") => Ok(Depth::All),
        Some(n) => n
            .parse()
            .map(Depth::Levels)
            .map_err(|_| SemanticError::InvalidFilter(format!("bad depth '{}'", n))),
    }
}

/// Parse a comma-separated filter expression.
pub fn parse_filter(expr: &str) -> SemanticResult<Vec<FilterClause>> {
    let mut clauses = Vec::new();
    for raw in expr.split(',').map(str::trim) {
        if raw.is_empty() {
            continue;
        }
        let caps = CLAUSE_PATTERN
            .captures(raw)
            .ok_or_else(|| SemanticError::InvalidFilter(raw.into()))?;
        let name = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        if name.is_empty() {
            return Err(SemanticError::InvalidFilter(raw.into()));
        }
        clauses.push(FilterClause {
            name: name.to_string(),
            ancestors: parse_depth(caps.get(1))?,
            descendants: parse_depth(caps.get(3))?,
        });
    }
    if clauses.is_empty() {
        return Err(SemanticError::InvalidFilter("empty filter".into()));
    }
    Ok(clauses)
}

impl EntityGraph {
    /// Select sub-graphs matching a filter expression.
    ///
    /// Each clause selects its node plus the requested ancestors and
    /// descendants. Overlapping selections are unioned; disjoint ones
    /// come back as separate graphs, in clause order.
    pub fn filter_dag(&self, expr: &str) -> SemanticResult<Vec<EntityGraph>> {
        let mut groups: Vec<BTreeSet<NodeIndex>> = Vec::new();

        for clause in parse_filter(expr)? {
            let starts = self.indices_named(&clause.name);
            if starts.is_empty() {
                return Err(SemanticError::UnknownEntity(clause.name));
            }

            let mut selected = BTreeSet::new();
            for &start in starts {
                selected.insert(start);
                selected.extend(self.within(start, Direction::Incoming, clause.ancestors));
                selected.extend(self.within(start, Direction::Outgoing, clause.descendants));
            }

            let (overlapping, mut rest): (Vec<_>, Vec<_>) =
                groups.into_iter().partition(|g| !g.is_disjoint(&selected));
            let merged = overlapping.into_iter().fold(selected, |mut acc, g| {
                acc.extend(g);
                acc
            });
            rest.push(merged);
            groups = rest;
        }

        Ok(groups.iter().map(|g| self.subgraph(g)).collect())
    }

    /// Nodes reachable from `start` within `depth` hops along `dir`.
    fn within(&self, start: NodeIndex, dir: Direction, depth: Depth) -> BTreeSet<NodeIndex> {
        let limit = match depth {
            Depth::None => return BTreeSet::new(),
            Depth::Levels(n) => Some(n),
            Depth::All => None,
        };

        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((node, dist)) = queue.pop_front() {
            if limit.is_some_and(|max| dist >= max) {
                continue;
            }
            for next in self.graph.neighbors_directed(node, dir) {
                if seen.insert(next) {
                    queue.push_back((next, dist + 1));
                }
            }
        }
        seen.remove(&start);
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clause_forms() {
        let clauses = parse_filter("orders, +users, 2+chart+, trace+1").unwrap();
        assert_eq!(
            clauses[0],
            FilterClause {
                name: "orders".into(),
                ancestors: Depth::None,
                descendants: Depth::None,
            }
        );
        assert_eq!(clauses[1].ancestors, Depth::All);
        assert_eq!(clauses[2].ancestors, Depth::Levels(2));
        assert_eq!(clauses[2].descendants, Depth::All);
        assert_eq!(clauses[3].name, "trace");
        assert_eq!(clauses[3].descendants, Depth::Levels(1));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(parse_filter(" , "), Err(SemanticError::InvalidFilter(_))));
    }
}
