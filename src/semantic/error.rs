//! Unified error types for the semantic layer.
//!
//! One error type covers reference parsing, entity-graph construction,
//! dimension/metric resolution, and join planning. Expression-shape
//! validation does not use it: validators report through
//! [`crate::validation::ValidationResult`] instead of failing.

use std::fmt;

/// Result type for semantic operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Maximum number of available metric names listed in a not-found error.
pub const MAX_LISTED_METRICS: usize = 10;

/// Unified error type for the semantic layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticError {
    /// A `${...}` block that is not a well-formed `${ref(...)}` token.
    ReferenceSyntax { fragment: String, message: String },

    /// A `ref()` that matches zero or several entities in the graph.
    BadReference {
        parent: String,
        reference: String,
        matches: usize,
    },

    /// The entity graph contains a cycle (path ends where it started).
    CyclicGraph(Vec<String>),

    /// Metrics reference each other in a cycle.
    CircularDependency(Vec<String>),

    /// Dimension name is not in the resolver index.
    DimensionNotFound { name: String },

    /// Metric name is not in the resolver index.
    MetricNotFound { name: String, available: Vec<String> },

    /// A bare metric name exists in more than one model.
    AmbiguousMetric { name: String, models: Vec<String> },

    /// More than one shortest join path between two models.
    AmbiguousJoin {
        from: String,
        to: String,
        paths: Vec<String>,
    },

    /// Models cannot be connected through declared relations.
    NoJoinPath { models: Vec<String> },

    /// Join planning failed while compiling a query.
    CannotJoin {
        models: Vec<String>,
        source: Box<SemanticError>,
    },

    /// Referenced an entity that doesn't exist.
    UnknownEntity(String),

    /// Malformed `filter_dag` clause.
    InvalidFilter(String),

    /// Logically malformed query description.
    InvalidQuery(String),
}

impl SemanticError {
    /// Build a `MetricNotFound` error listing a truncated, sorted set of names.
    pub fn metric_not_found<'a>(
        name: &str,
        available: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut available: Vec<String> = available.into_iter().cloned().collect();
        available.sort();
        available.truncate(MAX_LISTED_METRICS);
        SemanticError::MetricNotFound {
            name: name.into(),
            available,
        }
    }

    /// Is this a join-planning failure (no path or ambiguous path)?
    pub fn is_join_error(&self) -> bool {
        matches!(
            self,
            SemanticError::NoJoinPath { .. }
                | SemanticError::AmbiguousJoin { .. }
                | SemanticError::CannotJoin { .. }
        )
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::ReferenceSyntax { fragment, message } => {
                write!(f, "Invalid reference syntax in '{}': {}", fragment, message)
            }
            SemanticError::BadReference {
                parent,
                reference,
                matches,
            } => {
                if *matches == 0 {
                    write!(
                        f,
                        "'{}' references '{}', which does not match any project item",
                        parent, reference
                    )
                } else {
                    write!(
                        f,
                        "'{}' references '{}', which matches {} project items",
                        parent, reference, matches
                    )
                }
            }
            SemanticError::CyclicGraph(cycle) => {
                write!(f, "Project contains a circular reference: {}", cycle.join(" -> "))
            }
            SemanticError::CircularDependency(cycle) => {
                write!(
                    f,
                    "Circular dependency detected between metrics: {}",
                    cycle.join(" -> ")
                )
            }
            SemanticError::DimensionNotFound { name } => {
                write!(f, "Dimension '{}' not found", name)
            }
            SemanticError::MetricNotFound { name, available } => {
                write!(f, "Metric '{}' not found", name)?;
                if !available.is_empty() {
                    write!(f, ". Available metrics: {}", available.join(", "))?;
                }
                Ok(())
            }
            SemanticError::AmbiguousMetric { name, models } => {
                write!(
                    f,
                    "Ambiguous metric reference '{}': defined in models {}. \
                     Specify ${{ref(model).{}}}",
                    name,
                    models.join(", "),
                    name
                )
            }
            SemanticError::AmbiguousJoin { from, to, paths } => {
                write!(
                    f,
                    "Ambiguous join between '{}' and '{}': {} equally short paths. Candidates: {}",
                    from,
                    to,
                    paths.len(),
                    paths.join("; ")
                )
            }
            SemanticError::NoJoinPath { models } => {
                write!(f, "No join path connects models: {}", models.join(", "))
            }
            SemanticError::CannotJoin { models, source } => {
                write!(f, "Cannot join models {}: {}", models.join(", "), source)
            }
            SemanticError::UnknownEntity(name) => {
                write!(f, "Unknown entity: '{}'", name)
            }
            SemanticError::InvalidFilter(msg) => {
                write!(f, "Invalid filter: {}", msg)
            }
            SemanticError::InvalidQuery(msg) => {
                write!(f, "Invalid query: {}", msg)
            }
        }
    }
}

impl std::error::Error for SemanticError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SemanticError::CannotJoin { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
