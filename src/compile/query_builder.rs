//! SqlQueryBuilder - one [`TokenizedTrace`] to one SQL statement.
//!
//! The pipeline runs once, front to back:
//!
//! ```text
//! layout (CTEs, joins) -> SELECT -> GROUP BY -> WHERE/HAVING -> ORDER BY -> LIMIT
//! ```
//!
//! Single-model traces read from a `base_model` CTE. Traces that reference
//! other models get one `{model}_cte` per model in the join plan, with the
//! base model in FROM.
//!
//! Expressions that fail to parse never abort the build: select items
//! degrade to a quoted column, filters and ORDER BY entries to their text.
//! Join planning failures and malformed traces abort with a
//! [`SemanticError`].

use std::collections::{BTreeSet, HashMap, HashSet};

use super::cte::{CteBuilder, BASE_MODEL_ALIAS};
use super::schema::TypeSchema;
use super::{CompileContext, CompileOutput};
use crate::model::{FilterBy, TokenizedTrace};
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::refs;
use crate::sql::dialect::SqlDialect;
use crate::sql::parse::{self, ExprAnalysis};
use crate::sql::{
    col, conjunction, raw_sql, Cte, Dialect, Expr, ExprExt, JoinType, OrderByExpr, Query, Scope,
    SelectExpr, SortDir,
};

/// Alias of the cohort column.
pub const COHORT_ALIAS: &str = "cohort_on";

/// How a SELECT item takes part in grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Aggregate,
    Window,
    Constant,
    Plain,
}

impl ItemKind {
    fn of(analysis: &ExprAnalysis) -> Self {
        if analysis.has_aggregate() {
            ItemKind::Aggregate
        } else if analysis.has_window() {
            ItemKind::Window
        } else if analysis.is_constant() {
            ItemKind::Constant
        } else {
            ItemKind::Plain
        }
    }
}

#[derive(Debug, Clone)]
struct SelectItem {
    /// Key as given in the trace.
    name: String,
    /// Emitted alias.
    alias: String,
    /// Expression text after reference resolution.
    source: String,
    bare_column: Option<String>,
    expr: Expr,
    kind: ItemKind,
}

impl SelectItem {
    fn groupable(&self) -> bool {
        matches!(self.kind, ItemKind::Plain | ItemKind::Constant)
    }
}

/// Tables the query reads and how models map onto them.
#[derive(Debug)]
struct Layout {
    multi_model: bool,
    ctes: Vec<Cte>,
    from_alias: String,
    joins: Vec<(JoinType, String, String)>,
    /// Model name to the alias it is read through.
    aliases: HashMap<String, String>,
    models: Vec<String>,
    scope: Scope,
}

impl Layout {
    fn model_alias(&self, model: &str) -> Option<&str> {
        self.aliases.get(model).map(String::as_str)
    }
}

/// Compiles one trace against a [`CompileContext`].
#[derive(Debug)]
pub struct SqlQueryBuilder<'c, 'a> {
    ctx: &'c CompileContext<'a>,
    trace: &'c TokenizedTrace,
    dialect: Dialect,
}

impl<'c, 'a> SqlQueryBuilder<'c, 'a> {
    /// A trace with a recognised `source_type` compiles for that dialect;
    /// otherwise the context's dialect applies.
    pub fn new(ctx: &'c CompileContext<'a>, trace: &'c TokenizedTrace) -> Self {
        let dialect = match trace.source_type.as_deref() {
            Some(source_type) => source_type.parse().unwrap_or_else(|_| {
                tracing::debug!(source_type, "unrecognised source type, using configured dialect");
                ctx.options.dialect
            }),
            None => ctx.options.dialect,
        };
        Self { ctx, trace, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Build the query and render it.
    pub fn build(&self) -> SemanticResult<CompileOutput> {
        let (query, models) = self.build_query()?;
        let sql = if self.ctx.options.pretty {
            query.to_sql(self.dialect)
        } else {
            query.to_sql_compact(self.dialect)
        };
        Ok(CompileOutput {
            sql,
            query,
            dialect: self.dialect,
            models,
        })
    }

    /// Build the query AST and the models it reads, FROM model first.
    pub fn build_query(&self) -> SemanticResult<(Query, Vec<String>)> {
        let layout = self.layout()?;

        let mut items = Vec::with_capacity(self.trace.select_items.len() + 1);
        for (name, expression) in &self.trace.select_items {
            items.push(self.select_item(name, expression, &layout)?);
        }
        let cohort = self.select_item(COHORT_ALIAS, &self.trace.cohort_on, &layout)?;
        items.push(cohort);
        check_unique_aliases(&items)?;

        let group_by = self.group_by(&items);
        let (vanilla, aggregate) = self.filters(&layout)?;
        let mut order_by = Vec::with_capacity(self.trace.order_by.len());
        for entry in &self.trace.order_by {
            order_by.push(self.order_entry(entry, &items, !group_by.is_empty(), &layout)?);
        }

        let mut query = Query::new();
        for cte in layout.ctes.iter().cloned() {
            query = query.with_cte(cte);
        }
        query = query
            .select(
                items
                    .iter()
                    .map(|item| item.expr.clone().alias(&item.alias))
                    .collect::<Vec<SelectExpr>>(),
            )
            .from(&layout.from_alias);

        for (join_type, alias, condition) in &layout.joins {
            query = match join_type {
                JoinType::Cross => query.cross_join(alias),
                _ => query.join(*join_type, alias, self.join_condition(condition, &layout)),
            };
        }
        if let Some(condition) = conjunction(vanilla) {
            query = query.filter(condition);
        }
        if !group_by.is_empty() {
            query = query.group_by(group_by);
        }
        if let Some(condition) = conjunction(aggregate) {
            query = query.having(condition);
        }
        if !order_by.is_empty() {
            query = query.order_by(order_by);
        }
        if let Some(limit) = self.trace.limit {
            query = query.limit(limit);
        }

        Ok((query, layout.models))
    }

    // =========================================================================
    // Layout
    // =========================================================================

    fn layout(&self) -> SemanticResult<Layout> {
        let ctes = CteBuilder::new(self.dialect, &self.ctx.sanitizer, &self.ctx.options.cte_suffix);
        let base = self.trace.base_model.as_deref();
        let schema = TypeSchema::from_project(self.ctx.project, &ctes, base);

        if !self.trace.is_multi_model() {
            let sql = self.base_sql()?;
            let aliases = base
                .map(|b| (b.to_string(), BASE_MODEL_ALIAS.to_string()))
                .into_iter()
                .collect();
            return Ok(Layout {
                multi_model: false,
                ctes: vec![ctes.base(&sql)],
                from_alias: BASE_MODEL_ALIAS.to_string(),
                joins: Vec::new(),
                aliases,
                models: base.map(String::from).into_iter().collect(),
                scope: schema.scope(&[BASE_MODEL_ALIAS]),
            });
        }

        let Some(base) = base else {
            return Err(SemanticError::InvalidQuery(
                "base_model is required when other models are referenced".into(),
            ));
        };
        let joined = self.trace.joined_models();
        let plan = self
            .ctx
            .relations
            .join_plan_from(base, &joined)
            .map_err(|source| SemanticError::CannotJoin {
                models: std::iter::once(base)
                    .chain(joined.iter().copied())
                    .map(String::from)
                    .collect(),
                source: Box::new(source),
            })?;

        let models: Vec<String> = plan.models().into_iter().map(String::from).collect();
        let mut layout = Layout {
            multi_model: true,
            ctes: Vec::with_capacity(models.len()),
            from_alias: ctes.alias(&plan.from_model),
            joins: Vec::with_capacity(plan.joins.len()),
            aliases: HashMap::new(),
            models: Vec::new(),
            scope: Scope::new(),
        };
        for name in &models {
            let model = self
                .ctx
                .project
                .model(name)
                .ok_or_else(|| SemanticError::InvalidQuery(format!("unknown model '{}'", name)))?;
            let sql = if name == base && !self.trace.sql.trim().is_empty() {
                self.trace.sql.as_str()
            } else {
                model.sql.as_str()
            };
            layout.ctes.push(ctes.model(name, sql));
            layout.aliases.insert(name.clone(), ctes.alias(name));
        }
        for step in &plan.joins {
            layout
                .joins
                .push((step.join_type, ctes.alias(&step.to), step.condition.clone()));
        }

        let aliases: Vec<String> = models.iter().map(|m| ctes.alias(m)).collect();
        layout.scope = schema.scope(&aliases);
        layout.models = models;
        Ok(layout)
    }

    fn base_sql(&self) -> SemanticResult<String> {
        if !self.trace.sql.trim().is_empty() {
            return Ok(self.trace.sql.clone());
        }
        self.trace
            .base_model
            .as_deref()
            .and_then(|name| self.ctx.project.model(name))
            .map(|model| model.sql.clone())
            .ok_or_else(|| SemanticError::InvalidQuery("trace has no base SQL".into()))
    }

    // =========================================================================
    // Reference resolution
    // =========================================================================

    /// Replace metric, dimension and model references with SQL.
    ///
    /// References to nothing known are kept as written. Metrics and
    /// dimensions of models outside the query are rejected.
    fn resolve(&self, text: &str, layout: &Layout) -> SemanticResult<String> {
        self.resolve_with(text, layout, &mut HashSet::new())
    }

    /// `expanding` holds the project dimensions being expanded; a reference
    /// back to one of them is kept as written.
    fn resolve_with(
        &self,
        text: &str,
        layout: &Layout,
        expanding: &mut HashSet<String>,
    ) -> SemanticResult<String> {
        if !refs::has_pattern(text) {
            return Ok(text.to_string());
        }

        refs::try_replace_refs::<_, SemanticError>(text, |entity, path| {
            if let Some(entry) = self.ctx.metrics.lookup_ref(entity, path)? {
                if let Some(owner) = entry.model.as_deref() {
                    self.model_alias(owner, layout)?;
                }
                let sql = self.ctx.metrics.resolve_expression(&entry.key)?;
                let sql = self.localize(&sql, entry.model.as_deref(), layout);
                return Ok(Some(format!("({})", sql)));
            }

            let key = match (refs::simple_field(path), path) {
                (Some(field), _) => Some(format!("{}.{}", entity, field)),
                (None, None) => Some(entity.to_string()),
                (None, Some(_)) => None,
            };
            if let Some(key) = key {
                if let Ok(entry) = self.ctx.dimensions.find(&key) {
                    // Nested model dimensions are resolved here so each one
                    // is prefixed with its own model's CTE.
                    if entry.is_project_level() {
                        if expanding.contains(&key) {
                            return Ok(None);
                        }
                        expanding.insert(key.clone());
                        let sql = self.resolve_with(&entry.dimension.expression, layout, expanding);
                        expanding.remove(&key);
                        return Ok(Some(format!("({})", sql?)));
                    }
                    if let Some(owner) = entry.model_name() {
                        self.model_alias(owner, layout)?;
                    }
                    let sql = self.ctx.dimensions.resolve_expression(&key, None)?;
                    let sql = self.localize(&sql, entry.model_name(), layout);
                    return Ok(Some(format!("({})", sql)));
                }
            }

            if self.ctx.project.has_model(entity) {
                let alias = self.model_alias(entity, layout)?;
                return Ok(Some(match path {
                    Some(p) => format!("{}.{}", alias, p),
                    None => alias,
                }));
            }

            tracing::debug!(entity, path = ?path, "unresolved reference kept as written");
            Ok(None)
        })
    }

    fn model_alias(&self, model: &str, layout: &Layout) -> SemanticResult<String> {
        if let Some(alias) = layout.model_alias(model) {
            return Ok(alias.to_string());
        }
        if !layout.multi_model && self.trace.base_model.is_none() {
            return Ok(BASE_MODEL_ALIAS.to_string());
        }
        Err(SemanticError::InvalidQuery(format!(
            "model '{}' is referenced but not part of the query",
            model
        )))
    }

    /// Point an expression owned by `owner` at the tables of this query.
    fn localize(&self, sql: &str, owner: Option<&str>, layout: &Layout) -> String {
        let sql = refs::replace_known(sql, |entity, path| {
            let alias = layout.model_alias(entity)?;
            Some(match path {
                Some(p) => format!("{}.{}", alias, p),
                None => alias.to_string(),
            })
        });
        match owner.and_then(|o| layout.model_alias(o)) {
            Some(alias) if layout.multi_model => parse::prefix_columns(&sql, alias, self.dialect),
            _ => sql,
        }
    }

    fn render(&self, expr: &sqlparser::ast::Expr, layout: &Layout) -> String {
        if self.ctx.options.qualify {
            parse::render_qualified(expr, &layout.scope, self.dialect)
        } else {
            expr.to_string()
        }
    }

    // =========================================================================
    // Clauses
    // =========================================================================

    fn select_item(&self, name: &str, expression: &str, layout: &Layout) -> SemanticResult<SelectItem> {
        let source = self.resolve(expression, layout)?;
        let alias = name.replace('.', &self.ctx.options.alias_separator);

        Ok(match parse::parse_expression(&source, self.dialect) {
            Ok(parsed) => SelectItem {
                name: name.to_string(),
                alias,
                bare_column: parse::bare_column(&parsed).map(String::from),
                expr: raw_sql(&self.render(&parsed, layout)),
                kind: ItemKind::of(&parse::analyze(&parsed)),
                source,
            },
            Err(e) => {
                tracing::debug!(alias = %name, error = %e, "select expression did not parse, using it as a column");
                SelectItem {
                    name: name.to_string(),
                    alias,
                    bare_column: None,
                    expr: col(&source),
                    kind: ItemKind::Plain,
                    source,
                }
            }
        })
    }

    /// GROUP BY items, empty when the SELECT list needs no grouping.
    ///
    /// Grouping applies when an aggregate sits next to a plain column. Every
    /// non-aggregate, non-window item is listed by alias; dialects without
    /// alias support get the expressions, constants left out.
    fn group_by(&self, items: &[SelectItem]) -> Vec<Expr> {
        let has_aggregate = items.iter().any(|i| i.kind == ItemKind::Aggregate);
        let has_plain = items.iter().any(|i| i.kind == ItemKind::Plain);
        if !(has_aggregate && has_plain) {
            return Vec::new();
        }

        let by_alias = self.dialect.supports_group_by_alias();
        items
            .iter()
            .filter(|i| i.groupable())
            .filter_map(|i| match (by_alias, i.kind) {
                (true, _) => Some(col(&i.alias)),
                (false, ItemKind::Plain) => Some(i.expr.clone()),
                (false, _) => None,
            })
            .collect()
    }

    /// WHERE and HAVING predicates.
    fn filters(&self, layout: &Layout) -> SemanticResult<(Vec<Expr>, Vec<Expr>)> {
        let mut vanilla = Vec::new();
        let mut aggregate = Vec::new();

        match &self.trace.filter_by {
            FilterBy::Flat(filters) => {
                for filter in filters {
                    let (expr, is_aggregate) = self.predicate(filter, layout)?;
                    if is_aggregate {
                        aggregate.push(expr);
                    } else {
                        vanilla.push(expr);
                    }
                }
            }
            FilterBy::Split {
                vanilla: where_filters,
                aggregate: having_filters,
            } => {
                for filter in where_filters {
                    vanilla.push(self.predicate(filter, layout)?.0);
                }
                for filter in having_filters {
                    aggregate.push(self.predicate(filter, layout)?.0);
                }
            }
        }
        Ok((vanilla, aggregate))
    }

    /// Rendered predicate and whether it calls an aggregate.
    fn predicate(&self, filter: &str, layout: &Layout) -> SemanticResult<(Expr, bool)> {
        let resolved = self.resolve(filter, layout)?;
        Ok(match parse::parse_condition(&resolved, self.dialect) {
            Ok(condition) => (
                raw_sql(&self.render(&condition, layout)),
                parse::analyze(&condition).has_aggregate(),
            ),
            Err(e) => {
                tracing::debug!(filter = %resolved, error = %e, "filter did not parse, using it as written");
                (raw_sql(&resolved), false)
            }
        })
    }

    fn join_condition(&self, condition: &str, layout: &Layout) -> Expr {
        if !self.ctx.options.qualify {
            return raw_sql(condition);
        }
        match parse::parse_condition(condition, self.dialect) {
            Ok(parsed) => raw_sql(&self.render(&parsed, layout)),
            Err(e) => {
                tracing::debug!(condition, error = %e, "join condition did not parse, using it as written");
                raw_sql(condition)
            }
        }
    }

    /// One ORDER BY entry.
    ///
    /// A SELECT alias is ordered by alias. Under GROUP BY an entry matching
    /// a SELECT expression, or its bare column, is replaced by that alias.
    fn order_entry(
        &self,
        entry: &str,
        items: &[SelectItem],
        grouped: bool,
        layout: &Layout,
    ) -> SemanticResult<OrderByExpr> {
        let (text, dir) = split_direction(entry);
        let resolved = self.resolve(text, layout)?;
        let wanted = resolved.trim();

        let by_alias = items
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(wanted) || i.alias.eq_ignore_ascii_case(wanted));
        let by_expression = || {
            items.iter().find(|i| {
                i.source.trim().eq_ignore_ascii_case(wanted)
                    || i.bare_column.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(wanted))
            })
        };
        let matched = by_alias.or_else(|| if grouped { by_expression() } else { None });
        if let Some(item) = matched {
            return Ok(OrderByExpr::new(col(&item.alias), dir));
        }

        let expr = match parse::parse_expression(wanted, self.dialect) {
            Ok(parsed) => raw_sql(&self.render(&parsed, layout)),
            Err(e) => {
                tracing::debug!(order_by = %wanted, error = %e, "order expression did not parse, using it as written");
                raw_sql(wanted)
            }
        };
        Ok(OrderByExpr::new(expr, dir))
    }
}

/// Split a trailing, whitespace-delimited `ASC`/`DESC`.
fn split_direction(entry: &str) -> (&str, Option<SortDir>) {
    let trimmed = entry.trim();
    let Some((head, last)) = trimmed.rsplit_once(char::is_whitespace) else {
        return (trimmed, None);
    };
    if last.eq_ignore_ascii_case("asc") {
        (head.trim_end(), Some(SortDir::Asc))
    } else if last.eq_ignore_ascii_case("desc") {
        (head.trim_end(), Some(SortDir::Desc))
    } else {
        (trimmed, None)
    }
}

fn check_unique_aliases(items: &[SelectItem]) -> SemanticResult<()> {
    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(item.alias.to_lowercase()) {
            return Err(SemanticError::InvalidQuery(format!(
                "duplicate select alias '{}'",
                item.alias
            )));
        }
    }
    Ok(())
}
