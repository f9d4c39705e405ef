//! MetricResolver - metric name to SQL expression.
//!
//! Model metrics are keyed `model.name`, with the owning model found
//! through the entity graph. Project metrics are keyed by their bare name.
//! A bare name also finds a model metric when exactly one model defines it.
//!
//! Referenced metrics are substituted recursively and parenthesized:
//!
//! ```text
//! base    = SUM(amount)
//! derived = ${ref(base)} / COUNT(DISTINCT customer_id)
//!        -> (SUM(amount)) / COUNT(DISTINCT customer_id)
//! ```

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;

use super::entity_graph::{EntityGraph, EntityKind};
use super::error::{SemanticError, SemanticResult};
use super::refs;
use crate::model::{Metric, Project};

/// An indexed metric.
#[derive(Debug, Clone)]
pub struct MetricEntry<'a> {
    /// `model.name` for model metrics, `name` for project metrics.
    pub key: String,
    pub model: Option<String>,
    pub metric: &'a Metric,
}

/// Resolves metric names for one compile pass.
#[derive(Debug)]
pub struct MetricResolver<'a> {
    project: &'a Project,
    index: BTreeMap<String, MetricEntry<'a>>,
    /// Bare name to the keys of model metrics carrying it.
    by_name: BTreeMap<String, Vec<String>>,
    cache: DashMap<String, String>,
}

impl<'a> MetricResolver<'a> {
    pub fn new(project: &'a Project, graph: &EntityGraph) -> Self {
        let mut index = BTreeMap::new();
        let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for idx in graph.nodes_by_types(&[EntityKind::Metric]) {
            let Some(node) = graph.entity(idx) else {
                continue;
            };
            let (model, metric) = match graph.owning_model(idx) {
                Some(model_name) => (
                    Some(model_name.to_string()),
                    project.model(model_name).and_then(|m| m.metric(&node.name)),
                ),
                None => (None, project.metrics.iter().find(|m| m.name == node.name)),
            };
            let Some(metric) = metric else {
                continue;
            };

            let key = match &model {
                Some(model_name) => {
                    let key = format!("{}.{}", model_name, metric.name);
                    by_name.entry(metric.name.clone()).or_default().push(key.clone());
                    key
                }
                None => metric.name.clone(),
            };
            index.insert(
                key.clone(),
                MetricEntry {
                    key,
                    model,
                    metric,
                },
            );
        }

        Self {
            project,
            index,
            by_name,
            cache: DashMap::new(),
        }
    }

    /// Look up a metric by key or unambiguous bare name.
    ///
    /// `Ok(None)` means the name is not a metric.
    pub fn lookup(&self, name: &str) -> SemanticResult<Option<&MetricEntry<'a>>> {
        if let Some(entry) = self.index.get(name) {
            return Ok(Some(entry));
        }
        match self.by_name.get(name).map(Vec::as_slice) {
            Some([key]) => Ok(self.index.get(key)),
            Some(keys) if keys.len() > 1 => Err(SemanticError::AmbiguousMetric {
                name: name.into(),
                models: keys
                    .iter()
                    .filter_map(|k| self.index.get(k))
                    .filter_map(|e| e.model.clone())
                    .collect(),
            }),
            _ => Ok(None),
        }
    }

    /// Look up the target of `${ref(entity)}` or `${ref(model).metric}`.
    pub fn lookup_ref(&self, entity: &str, path: Option<&str>) -> SemanticResult<Option<&MetricEntry<'a>>> {
        match (refs::simple_field(path), path) {
            (Some(field), _) => Ok(self.index.get(&format!("{}.{}", entity, field))),
            (None, None) => self.lookup(entity),
            (None, Some(_)) => Ok(None),
        }
    }

    fn require(&self, name: &str) -> SemanticResult<&MetricEntry<'a>> {
        self.lookup(name)?
            .ok_or_else(|| SemanticError::metric_not_found(name, self.index.keys()))
    }

    /// Metric keys referenced directly by an expression.
    ///
    /// Ambiguous references are skipped here and reported on resolution.
    fn direct_dependencies(&self, entry: &MetricEntry<'a>) -> Vec<String> {
        let mut deps = Vec::new();
        for token in refs::tokenize(&entry.metric.expression) {
            if let Ok(Some(dep)) = self.lookup_ref(&token.entity, token.property_path.as_deref()) {
                if !deps.contains(&dep.key) {
                    deps.push(dep.key.clone());
                }
            }
        }
        deps
    }

    /// Every metric key transitively referenced by `name`.
    pub fn get_dependencies(&self, name: &str) -> SemanticResult<BTreeSet<String>> {
        let entry = self.require(name)?;
        let mut visited = BTreeSet::new();
        self.collect_dependencies(entry, &mut visited);
        visited.remove(&entry.key);
        Ok(visited)
    }

    fn collect_dependencies(&self, entry: &MetricEntry<'a>, visited: &mut BTreeSet<String>) {
        for dep in self.direct_dependencies(entry) {
            if visited.insert(dep.clone()) {
                if let Some(next) = self.index.get(&dep) {
                    self.collect_dependencies(next, visited);
                }
            }
        }
    }

    /// First metric reference cycle found, first key repeated at the end.
    pub fn detect_circular_dependencies(&self) -> Option<Vec<String>> {
        fn visit(
            this: &MetricResolver<'_>,
            key: &str,
            stack: &mut Vec<String>,
            done: &mut BTreeSet<String>,
        ) -> Option<Vec<String>> {
            if let Some(pos) = stack.iter().position(|k| k == key) {
                let mut cycle = stack[pos..].to_vec();
                cycle.push(key.to_string());
                return Some(cycle);
            }
            if done.contains(key) {
                return None;
            }
            let entry = this.index.get(key)?;
            stack.push(key.to_string());
            for dep in this.direct_dependencies(entry) {
                if let Some(cycle) = visit(this, &dep, stack, done) {
                    return Some(cycle);
                }
            }
            stack.pop();
            done.insert(key.to_string());
            None
        }

        let mut done = BTreeSet::new();
        for key in self.index.keys() {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(self, key, &mut stack, &mut done) {
                return Some(cycle);
            }
        }
        None
    }

    /// Metric keys ordered so every metric follows the metrics it references.
    pub fn topological_sort(&self) -> SemanticResult<Vec<String>> {
        if let Some(cycle) = self.detect_circular_dependencies() {
            return Err(SemanticError::CircularDependency(cycle));
        }

        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (key, entry) in &self.index {
            let deps = self.direct_dependencies(entry);
            in_degree.insert(key.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(key.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| *k)
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(key) = ready.pop_first() {
            order.push(key.to_string());
            for &dependent in dependents.get(key).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
        Ok(order)
    }

    /// SQL expression of a metric with every referenced metric expanded.
    ///
    /// Non-metric references are kept as written. A reference cycle fails
    /// with [`SemanticError::CircularDependency`].
    pub fn resolve_expression(&self, name: &str) -> SemanticResult<String> {
        let entry = self.require(name)?;
        let mut stack = Vec::new();
        self.resolve_entry(entry, &mut stack)
    }

    fn resolve_entry(&self, entry: &MetricEntry<'a>, stack: &mut Vec<String>) -> SemanticResult<String> {
        if let Some(hit) = self.cache.get(&entry.key) {
            return Ok(hit.value().clone());
        }
        if let Some(pos) = stack.iter().position(|k| *k == entry.key) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(entry.key.clone());
            return Err(SemanticError::CircularDependency(cycle));
        }

        stack.push(entry.key.clone());
        let resolved = refs::try_replace_refs::<_, SemanticError>(&entry.metric.expression, |entity, path| {
            match self.lookup_ref(entity, path)? {
                Some(dep) => Ok(Some(format!("({})", self.resolve_entry(dep, stack)?))),
                None => Ok(None),
            }
        })?;
        stack.pop();

        self.cache.insert(entry.key.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Resolved SQL plus the models it reads from, sorted.
    pub fn resolve_for_validation(&self, name: &str) -> SemanticResult<(String, Vec<String>)> {
        let sql = self.resolve_expression(name)?;
        let models = self.get_models_from_metric(name)?.into_iter().collect();
        Ok((sql, models))
    }

    /// Owning model, dependency models, and directly referenced models.
    pub fn get_models_from_metric(&self, name: &str) -> SemanticResult<BTreeSet<String>> {
        let entry = self.require(name)?;
        let mut keys = self.get_dependencies(name)?;
        keys.insert(entry.key.clone());

        let mut models = BTreeSet::new();
        for key in &keys {
            let Some(dep) = self.index.get(key) else {
                continue;
            };
            models.extend(dep.model.clone());
            for token in refs::tokenize(&dep.metric.expression) {
                let is_metric = matches!(
                    self.lookup_ref(&token.entity, token.property_path.as_deref()),
                    Ok(Some(_))
                );
                if !is_metric && self.project.has_model(&token.entity) {
                    models.insert(token.entity);
                }
            }
        }
        Ok(models)
    }

    /// Every metric key, sorted.
    pub fn metric_keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    fn resolve<T>(project: &Project, f: impl FnOnce(&MetricResolver<'_>) -> T) -> T {
        let graph = EntityGraph::build(project).unwrap();
        let resolver = MetricResolver::new(project, &graph);
        f(&resolver)
    }

    #[test]
    fn test_composition_parenthesizes() {
        let project = Project::new("p")
            .with_metric(Metric::new("base", "SUM(amount)"))
            .with_metric(Metric::new("derived", "${ref(base)} / COUNT(DISTINCT customer_id)"));
        resolve(&project, |r| {
            assert_eq!(
                r.resolve_expression("derived").unwrap(),
                "(SUM(amount)) / COUNT(DISTINCT customer_id)"
            );
        });
    }

    #[test]
    fn test_qualified_and_bare_lookup() {
        let project = Project::new("p").with_model(
            Model::new("orders", "SELECT 1")
                .with_metric(Metric::new("revenue", "SUM(amount)"))
                .with_metric(Metric::new("avg_rev", "${ref(orders).revenue} / COUNT(*)")),
        );
        resolve(&project, |r| {
            assert_eq!(r.resolve_expression("orders.revenue").unwrap(), "SUM(amount)");
            assert_eq!(r.resolve_expression("revenue").unwrap(), "SUM(amount)");
            assert_eq!(r.resolve_expression("avg_rev").unwrap(), "(SUM(amount)) / COUNT(*)");
        });
    }

    #[test]
    fn test_ambiguous_bare_name() {
        let project = Project::new("p")
            .with_model(Model::new("a", "SELECT 1").with_metric(Metric::new("total", "SUM(x)")))
            .with_model(Model::new("b", "SELECT 1").with_metric(Metric::new("total", "SUM(y)")));
        resolve(&project, |r| {
            assert_eq!(
                r.resolve_expression("total"),
                Err(SemanticError::AmbiguousMetric {
                    name: "total".into(),
                    models: vec!["a".into(), "b".into()],
                })
            );
            assert_eq!(r.resolve_expression("b.total").unwrap(), "SUM(y)");
        });
    }

    #[test]
    fn test_cycle_detection() {
        let project = Project::new("p")
            .with_metric(Metric::new("a", "${ref(b)}"))
            .with_metric(Metric::new("b", "${ref(a)}"));
        resolve(&project, |r| {
            assert_eq!(
                r.detect_circular_dependencies(),
                Some(vec!["a".to_string(), "b".to_string(), "a".to_string()])
            );
            assert!(matches!(
                r.topological_sort(),
                Err(SemanticError::CircularDependency(_))
            ));
            assert!(matches!(
                r.resolve_expression("a"),
                Err(SemanticError::CircularDependency(_))
            ));
        });
    }

    #[test]
    fn test_topological_order() {
        let project = Project::new("p")
            .with_metric(Metric::new("c", "${ref(b)} + ${ref(a)}"))
            .with_metric(Metric::new("b", "${ref(a)} * 2"))
            .with_metric(Metric::new("a", "SUM(x)"));
        resolve(&project, |r| {
            assert_eq!(r.topological_sort().unwrap(), vec!["a", "b", "c"]);
            let deps: Vec<String> = r.get_dependencies("c").unwrap().into_iter().collect();
            assert_eq!(deps, vec!["a", "b"]);
        });
    }

    #[test]
    fn test_models_from_metric() {
        let project = Project::new("p")
            .with_model(Model::new("orders", "SELECT 1").with_metric(Metric::new("revenue", "SUM(amount)")))
            .with_model(Model::new("users", "SELECT 1"))
            .with_metric(Metric::new(
                "rev_per_user",
                "${ref(orders).revenue} / COUNT(DISTINCT ${ref(users).id})",
            ));
        resolve(&project, |r| {
            let (sql, models) = r.resolve_for_validation("rev_per_user").unwrap();
            assert_eq!(sql, "(SUM(amount)) / COUNT(DISTINCT ${ref(users).id})");
            assert_eq!(models, vec!["orders", "users"]);
        });
    }

    #[test]
    fn test_not_found_lists_available() {
        let project = Project::new("p").with_metric(Metric::new("a", "SUM(x)"));
        resolve(&project, |r| match r.resolve_for_validation("zzz") {
            Err(SemanticError::MetricNotFound { name, available }) => {
                assert_eq!(name, "zzz");
                assert_eq!(available, vec!["a"]);
            }
            other => panic!("unexpected: {other:?}"),
        });
    }
}
