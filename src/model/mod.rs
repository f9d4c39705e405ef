//! Typed project entities consumed by the compiler.
//!
//! These are plain data: a parsed project tree and the per-query
//! [`TokenizedTrace`]. All resolution logic lives in [`crate::semantic`].

pub mod project;
pub mod relation;
pub mod sql_model;
pub mod tokenized;
pub mod types;

pub use project::{Chart, Dashboard, Input, InputType, Project, ProjectError, Source, Trace};
pub use relation::Relation;
pub use sql_model::{Dimension, Metric, Model};
pub use tokenized::{FilterBy, TokenizedTrace, DEFAULT_COHORT_ON};
pub use types::DataType;
