//! Semantic layer - references, entity graph, resolvers and join planning.
//!
//! Everything here works on a parsed [`crate::model::Project`] and is
//! rebuilt per compile pass:
//!
//! 1. **References** - [`refs`] parses `${ref(entity).field}` tokens
//! 2. **Graph** - [`entity_graph`] links every entity to what it references
//! 3. **Resolve** - [`dimension`] and [`metric`] turn names into SQL
//! 4. **Join** - [`relation_graph`] finds join paths between models
//!
//! Identifiers derived from entity names go through [`sanitize`].

pub mod dimension;
pub mod entity_graph;
pub mod error;
pub mod metric;
pub mod refs;
pub mod relation_graph;
pub mod sanitize;

pub use dimension::{DimensionEntry, DimensionResolver};
pub use entity_graph::{EdgeKind, EntityGraph, EntityKind, EntityNode, FieldLineage, FieldNode, GraphNode};
pub use error::{SemanticError, SemanticResult};
pub use metric::{MetricEntry, MetricResolver};
pub use refs::RefToken;
pub use relation_graph::{JoinPlan, JoinStep, RelationEdge, RelationGraph};
pub use sanitize::NameSanitizer;
