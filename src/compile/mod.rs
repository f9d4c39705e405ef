//! End-to-end compilation from a tokenized trace to SQL.
//!
//! ```text
//! Project -> EntityGraph -> resolvers + RelationGraph -> SqlQueryBuilder -> SQL
//! ```
//!
//! A [`CompileContext`] holds everything derived from one project for one
//! compile pass and can compile any number of traces.
//!
//! # Example
//!
//! ```ignore
//! use sqlweave::compile::{compile, CompileOptions};
//! use sqlweave::model::{Model, Project, Relation, TokenizedTrace};
//! use sqlweave::sql::Dialect;
//!
//! let project = Project::new("shop")
//!     .with_model(Model::new("orders", "SELECT * FROM orders_table"))
//!     .with_model(Model::new("users", "SELECT * FROM users_table"))
//!     .with_relation(Relation::new("orders_users", "${ref(orders).user_id} = ${ref(users).id}"));
//!
//! let trace = TokenizedTrace::new("SELECT * FROM orders_table")
//!     .with_base_model("orders")
//!     .referencing("users")
//!     .select("username", "username")
//!     .select("total", "SUM(amount)");
//!
//! let output = compile(&project, &trace, CompileOptions::default().with_dialect(Dialect::Postgres))?;
//! println!("{}", output.sql);
//! ```

pub mod cte;
pub mod query_builder;
pub mod schema;

pub use cte::{CteBuilder, BASE_MODEL_ALIAS};
pub use query_builder::{SqlQueryBuilder, COHORT_ALIAS};
pub use schema::TypeSchema;

use crate::config::{CompileSettings, SettingsError};
use crate::model::{Project, TokenizedTrace};
use crate::semantic::sanitize::CTE_SUFFIX;
use crate::semantic::{
    DimensionResolver, EntityGraph, MetricResolver, NameSanitizer, RelationGraph, SemanticResult,
};
use crate::sql::query::Query;
use crate::sql::Dialect;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,

    /// Alias suffix for per-model CTEs.
    pub cte_suffix: String,

    /// Replacement for '.' in SELECT aliases.
    pub alias_separator: String,

    /// Qualify and quote every identifier.
    pub qualify: bool,

    /// Multi-line output.
    pub pretty: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            cte_suffix: CTE_SUFFIX.to_string(),
            alias_separator: "|".to_string(),
            qualify: true,
            pretty: true,
        }
    }
}

impl CompileOptions {
    /// Options from the `[compile]` settings section.
    pub fn from_settings(settings: &CompileSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            dialect: settings.dialect()?,
            cte_suffix: settings.cte_suffix.clone(),
            alias_separator: settings.alias_separator.clone(),
            qualify: settings.qualify,
            pretty: settings.pretty,
        })
    }

    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_qualify(mut self, qualify: bool) -> Self {
        self.qualify = qualify;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling a trace to SQL.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The generated SQL string.
    pub sql: String,

    /// The SQL query AST.
    pub query: Query,

    /// The dialect used for generation.
    pub dialect: Dialect,

    /// Models read by the query, FROM model first.
    pub models: Vec<String>,
}

// ============================================================================
// Context
// ============================================================================

/// Per-pass state derived from a project.
///
/// Resolver and sanitizer caches live here and are dropped with the
/// context.
#[derive(Debug)]
pub struct CompileContext<'a> {
    pub project: &'a Project,
    pub options: CompileOptions,
    pub sanitizer: NameSanitizer,
    pub graph: EntityGraph,
    pub dimensions: DimensionResolver<'a>,
    pub metrics: MetricResolver<'a>,
    pub relations: RelationGraph,
}

impl<'a> CompileContext<'a> {
    /// Build the entity graph, resolvers and relation graph.
    ///
    /// Fails on references that match no entity or several. Cycles are
    /// not checked here: metric cycles fail when a trace resolves them.
    pub fn new(project: &'a Project, options: CompileOptions) -> SemanticResult<Self> {
        let graph = EntityGraph::build(project)?;

        let sanitizer = NameSanitizer::new();
        let dimensions = DimensionResolver::new(project);
        let metrics = MetricResolver::new(project, &graph);
        let relations = RelationGraph::with_alias_suffix(project, &sanitizer, &options.cte_suffix, None);
        for warning in relations.validate() {
            tracing::debug!(project = %project.name, %warning, "relation graph");
        }

        Ok(Self {
            project,
            options,
            sanitizer,
            graph,
            dimensions,
            metrics,
            relations,
        })
    }

    /// Builder for one trace.
    pub fn builder<'c>(&'c self, trace: &'c TokenizedTrace) -> SqlQueryBuilder<'c, 'a> {
        SqlQueryBuilder::new(self, trace)
    }

    /// Compile one trace.
    pub fn compile(&self, trace: &TokenizedTrace) -> SemanticResult<CompileOutput> {
        self.builder(trace).build()
    }
}

/// Compile a single trace against a project.
pub fn compile(
    project: &Project,
    trace: &TokenizedTrace,
    options: CompileOptions,
) -> SemanticResult<CompileOutput> {
    CompileContext::new(project, options)?.compile(trace)
}
