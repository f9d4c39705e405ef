//! Static checks run before any SQL is generated.
//!
//! Individual checks never fail hard: they return a [`ValidationResult`]
//! so callers can batch diagnostics. [`validate`] runs every check over a
//! project and collects the failures.

pub mod accessor;
pub mod metric;

pub use accessor::{Accessor, AccessorValidator};
pub use metric::MetricValidator;

use crate::model::Project;
use crate::semantic::{DimensionResolver, EntityGraph, MetricResolver};
use crate::sql::Dialect;

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<(), String> {
        match self.error {
            Some(error) if !self.is_valid => Err(error),
            _ => Ok(()),
        }
    }
}

/// Validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The entity graph could not be built or has a cycle.
    Graph(String),
    InvalidMetric { name: String, message: String },
    InvalidDimension { name: String, message: String },
    InvalidRelation { name: String, message: String },
    /// Bad input accessor in an entity's SQL.
    InvalidAccessor {
        entity_type: &'static str,
        name: String,
        message: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Graph(message) => f.write_str(message),
            ValidationError::InvalidMetric { name, message } => {
                write!(f, "Metric '{}': {}", name, message)
            }
            ValidationError::InvalidDimension { name, message } => {
                write!(f, "Dimension '{}': {}", name, message)
            }
            ValidationError::InvalidRelation { name, message } => {
                write!(f, "Relation '{}': {}", name, message)
            }
            ValidationError::InvalidAccessor {
                entity_type,
                name,
                message,
            } => write!(f, "{} '{}': {}", entity_type, name, message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate every metric, dimension, relation and input accessor.
pub fn validate(project: &Project, dialect: Dialect) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let validator = MetricValidator::new(dialect);

    match EntityGraph::build(project).and_then(|graph| graph.validate().map(|()| graph)) {
        Ok(graph) => validate_metrics(project, &graph, &validator, &mut errors),
        Err(e) => errors.push(ValidationError::Graph(e.to_string())),
    }
    validate_dimensions(project, &validator, &mut errors);
    validate_relations(project, &validator, &mut errors);
    validate_accessors(project, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_metrics(
    project: &Project,
    graph: &EntityGraph,
    validator: &MetricValidator,
    errors: &mut Vec<ValidationError>,
) {
    let resolver = MetricResolver::new(project, graph);
    let keys: Vec<String> = resolver.metric_keys().map(String::from).collect();
    for key in keys {
        let outcome = resolver
            .resolve_for_validation(&key)
            .map_err(|e| e.to_string())
            .and_then(|(sql, _)| validator.validate_aggregate_expression(&sql).into_result());
        if let Err(message) = outcome {
            errors.push(ValidationError::InvalidMetric { name: key, message });
        }
    }
}

fn validate_dimensions(project: &Project, validator: &MetricValidator, errors: &mut Vec<ValidationError>) {
    for model in &project.models {
        for dimension in &model.dimensions {
            if let Err(message) = validator.validate_dimension_expression(&dimension.expression).into_result() {
                errors.push(ValidationError::InvalidDimension {
                    name: format!("{}.{}", model.name, dimension.name),
                    message,
                });
            }
        }
    }

    let resolver = DimensionResolver::new(project);
    for dimension in &project.dimensions {
        let outcome = resolver
            .resolve_expression(&dimension.name, None)
            .map_err(|e| e.to_string())
            .and_then(|sql| validator.validate_dimension_expression(&sql).into_result());
        if let Err(message) = outcome {
            errors.push(ValidationError::InvalidDimension {
                name: dimension.name.clone(),
                message,
            });
        }
    }
}

fn validate_relations(project: &Project, validator: &MetricValidator, errors: &mut Vec<ValidationError>) {
    for relation in &project.relations {
        let outcome = match relation.model_pair() {
            Some((left, right)) => validator
                .validate_join_condition(&relation.condition, &left, &right)
                .into_result(),
            None => Err("condition must reference exactly two models".to_string()),
        };
        if let Err(message) = outcome {
            errors.push(ValidationError::InvalidRelation {
                name: relation.name.clone(),
                message,
            });
        }
    }
}

fn validate_accessors(project: &Project, errors: &mut Vec<ValidationError>) {
    let accessors = AccessorValidator::new(project);
    let mut check = |entity_type: &'static str, name: String, text: &str| {
        if let Err(message) = accessors.validate(text).into_result() {
            errors.push(ValidationError::InvalidAccessor {
                entity_type,
                name,
                message,
            });
        }
    };

    for model in &project.models {
        check("Model", model.name.clone(), &model.sql);
        for metric in &model.metrics {
            check("Metric", format!("{}.{}", model.name, metric.name), &metric.expression);
        }
        for dimension in &model.dimensions {
            check("Dimension", format!("{}.{}", model.name, dimension.name), &dimension.expression);
        }
    }
    for metric in &project.metrics {
        check("Metric", metric.name.clone(), &metric.expression);
    }
    for dimension in &project.dimensions {
        check("Dimension", dimension.name.clone(), &dimension.expression);
    }
}
