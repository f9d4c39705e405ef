//! DimensionResolver - dimension name to SQL expression.
//!
//! Index keys:
//! - `model.name` for every model dimension (explicit replaces implicit)
//! - `name` for the highest-precedence dimension carrying that name
//!
//! Unqualified precedence is project-level, then explicit model, then
//! implicit model. Within one tier the first declared model wins.

use std::collections::{BTreeSet, HashMap, HashSet};

use dashmap::DashMap;

use super::error::{SemanticError, SemanticResult};
use super::refs;
use crate::model::{Dimension, Model, Project};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Implicit,
    Explicit,
    Project,
}

/// An indexed dimension and the model owning it, if any.
#[derive(Debug, Clone, Copy)]
pub struct DimensionEntry<'a> {
    /// `None` for project-level dimensions.
    pub model: Option<&'a Model>,
    pub dimension: &'a Dimension,
    tier: Tier,
}

impl DimensionEntry<'_> {
    pub fn is_project_level(&self) -> bool {
        self.model.is_none()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.map(|m| m.name.as_str())
    }
}

/// Resolves dimension names for one compile pass.
#[derive(Debug)]
pub struct DimensionResolver<'a> {
    project: &'a Project,
    index: HashMap<String, DimensionEntry<'a>>,
    cache: DashMap<String, String>,
}

impl<'a> DimensionResolver<'a> {
    pub fn new(project: &'a Project) -> Self {
        let mut index: HashMap<String, DimensionEntry<'a>> = HashMap::new();

        let mut insert = |key: String, entry: DimensionEntry<'a>, qualified: bool| {
            match index.get(&key) {
                // Qualified keys only ever collide within one model.
                Some(existing) if !qualified && existing.tier >= entry.tier => {
                    tracing::debug!(
                        dimension = %key,
                        kept = ?existing.model_name(),
                        shadowed = ?entry.model_name(),
                        "dimension name shadowed"
                    );
                }
                _ => {
                    index.insert(key, entry);
                }
            }
        };

        for model in &project.models {
            for (dims, tier) in [
                (&model.implicit_dimensions, Tier::Implicit),
                (&model.dimensions, Tier::Explicit),
            ] {
                for dimension in dims {
                    let entry = DimensionEntry {
                        model: Some(model),
                        dimension,
                        tier,
                    };
                    insert(format!("{}.{}", model.name, dimension.name), entry, true);
                    insert(dimension.name.clone(), entry, false);
                }
            }
        }

        for dimension in &project.dimensions {
            let entry = DimensionEntry {
                model: None,
                dimension,
                tier: Tier::Project,
            };
            insert(dimension.name.clone(), entry, false);
        }

        Self {
            project,
            index,
            cache: DashMap::new(),
        }
    }

    /// Look up a simple or `model.name` qualified dimension.
    pub fn find(&self, name: &str) -> SemanticResult<DimensionEntry<'a>> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SemanticError::DimensionNotFound { name: name.into() })
    }

    fn find_in(&self, name: &str, current_model: Option<&str>) -> SemanticResult<(String, DimensionEntry<'a>)> {
        if let Ok(entry) = self.find(name) {
            return Ok((name.to_string(), entry));
        }
        if let Some(model) = current_model {
            let qualified = format!("{}.{}", model, name);
            if let Ok(entry) = self.find(&qualified) {
                return Ok((qualified, entry));
            }
        }
        Err(SemanticError::DimensionNotFound { name: name.into() })
    }

    /// SQL expression for a dimension.
    ///
    /// Unknown names are retried as `current_model.name`. Project-level
    /// expressions have references to other dimensions expanded in place,
    /// parenthesized; other references are kept as written.
    pub fn resolve_expression(&self, name: &str, current_model: Option<&str>) -> SemanticResult<String> {
        let cache_key = match current_model {
            Some(model) => format!("{}::{}", model, name),
            None => name.to_string(),
        };
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(hit.value().clone());
        }

        let mut visiting = HashSet::new();
        let resolved = self.resolve_inner(name, current_model, &mut visiting)?;
        self.cache.insert(cache_key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_inner(
        &self,
        name: &str,
        current_model: Option<&str>,
        visiting: &mut HashSet<String>,
    ) -> SemanticResult<String> {
        let (key, entry) = self.find_in(name, current_model)?;
        let expression = &entry.dimension.expression;
        if !entry.is_project_level() || !refs::has_pattern(expression) {
            return Ok(expression.clone());
        }

        visiting.insert(key.clone());
        let expanded = refs::replace_known(expression, |entity, path| {
            let target = reference_key(entity, path)?;
            if visiting.contains(&target) {
                return None;
            }
            self.resolve_inner(&target, None, visiting)
                .ok()
                .map(|sql| format!("({})", sql))
        });
        visiting.remove(&key);
        Ok(expanded)
    }

    /// Models a dimension reads from: its owner plus any referenced model.
    pub fn models_from_dimension(&self, name: &str) -> SemanticResult<BTreeSet<String>> {
        let entry = self.find(name)?;
        let mut models: BTreeSet<String> = entry.model_name().map(String::from).into_iter().collect();
        models.extend(
            refs::extract_entity_names(&entry.dimension.expression)
                .into_iter()
                .filter(|m| self.project.has_model(m)),
        );
        Ok(models)
    }

    /// Resolve every dimension reference in `ref_text`.
    ///
    /// A text made of one reference becomes the bare expression; references
    /// embedded in larger text are parenthesized. References that are not
    /// dimensions are passed through with no models attributed.
    pub fn resolve_reference(&self, ref_text: &str, current_model: Option<&str>) -> (String, BTreeSet<String>) {
        let tokens = refs::tokenize(ref_text);
        let whole = matches!(tokens.as_slice(), [t] if ref_text.trim() == &ref_text[t.span.clone()]);

        let mut models = BTreeSet::new();
        let resolved = refs::replace_known(ref_text, |entity, path| {
            let name = reference_key(entity, path)?;
            let sql = self.resolve_expression(&name, current_model).ok()?;
            if let Ok((key, _)) = self.find_in(&name, current_model) {
                if let Ok(owners) = self.models_from_dimension(&key) {
                    models.extend(owners);
                }
            }
            Some(if whole { sql } else { format!("({})", sql) })
        });
        (resolved, models)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Index key a reference points at: `entity` or `entity.field`.
fn reference_key(entity: &str, path: Option<&str>) -> Option<String> {
    match (refs::simple_field(path), path) {
        (Some(field), _) => Some(format!("{}.{}", entity, field)),
        (None, None) => Some(entity.to_string()),
        (None, Some(_)) => None,
    }
}
