//! # sqlweave
//!
//! Composes SQL across the models of a semantic project.
//!
//! ## Architecture
//!
//! Models, metrics, dimensions and relations reference each other through
//! `${ref(name).field}` tokens. A compile pass turns those references into
//! one SQL statement per trace:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Project (YAML / JSON)                   │
//! │   (models, metrics, dimensions, relations, inputs)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [entity graph]
//! ┌─────────────────────────────────────────────────────────┐
//! │                      EntityGraph                         │
//! │          (references, ownership, field lineage)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolvers + relation graph]
//! ┌─────────────────────────────────────────────────────────┐
//! │   MetricResolver · DimensionResolver · RelationGraph     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query builder]  <- TokenizedTrace
//! ┌─────────────────────────────────────────────────────────┐
//! │        SQL (CTEs, joins, GROUP BY, WHERE / HAVING)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`validation`] checks expression shape and input accessors up front.

pub mod compile;
pub mod config;
pub mod model;
pub mod semantic;
pub mod sql;
pub mod validation;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile, CompileContext, CompileOptions, CompileOutput};
    pub use crate::config::Settings;
    pub use crate::model::{
        Dimension, FilterBy, Input, InputType, Metric, Model, Project, Relation, TokenizedTrace,
    };
    pub use crate::semantic::{
        DimensionResolver, EntityGraph, MetricResolver, RelationGraph, SemanticError, SemanticResult,
    };
    pub use crate::sql::{Dialect, JoinType, Query};
    pub use crate::validation::{AccessorValidator, MetricValidator, ValidationResult};
}

pub use compile::{compile, CompileOptions, CompileOutput};
pub use model::{Project, TokenizedTrace};
pub use semantic::{SemanticError, SemanticResult};
pub use sql::Dialect;
