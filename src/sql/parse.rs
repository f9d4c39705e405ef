//! Bridge between expression text and the `sqlparser` AST.
//!
//! Expressions, filters and model SQL arrive as text. This module parses
//! them in the target dialect, classifies them (aggregate, window, plain),
//! qualifies bare columns with the CTE that owns them and renders them back
//! with every identifier quoted for the dialect.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

use sqlparser::ast::{
    self, Expr as SqlExpr, Ident, SelectItem, SetExpr, Statement, Visit, VisitMut, Visitor,
    VisitorMut,
};
use sqlparser::parser::{Parser, ParserError};

use super::dialect::{Dialect, SqlDialect};

/// Error type for expression parsing and qualification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse SQL: {0}")]
    Syntax(String),

    #[error("Expected a single expression, got '{0}'")]
    NotAnExpression(String),

    #[error("Expected a single SELECT statement")]
    NotAQuery,

    #[error("Column '{column}' is ambiguous between {tables:?}")]
    AmbiguousColumn { column: String, tables: Vec<String> },
}

impl From<ParserError> for ParseError {
    fn from(e: ParserError) -> Self {
        ParseError::Syntax(e.to_string())
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a full statement that must be a single query.
pub fn parse_query(sql: &str, dialect: Dialect) -> Result<Box<ast::Query>, ParseError> {
    let parser_dialect = dialect.parser_dialect();
    let mut statements = Parser::parse_sql(&*parser_dialect, sql)?;
    if statements.len() != 1 {
        return Err(ParseError::NotAQuery);
    }
    match statements.remove(0) {
        Statement::Query(query) => Ok(query),
        _ => Err(ParseError::NotAQuery),
    }
}

fn parse_select(sql: &str, dialect: Dialect) -> Result<ast::Select, ParseError> {
    let query = parse_query(sql, dialect)?;
    if query.with.is_some() {
        return Err(ParseError::NotAQuery);
    }
    match *query.body {
        SetExpr::Select(select) => Ok(*select),
        _ => Err(ParseError::NotAQuery),
    }
}

/// Parse a single scalar expression, e.g. `SUM(amount) / 2`.
pub fn parse_expression(sql: &str, dialect: Dialect) -> Result<SqlExpr, ParseError> {
    let select = parse_select(&format!("SELECT {sql}"), dialect)?;
    if !select.from.is_empty() || select.selection.is_some() {
        return Err(ParseError::NotAnExpression(sql.to_string()));
    }
    match <[SelectItem; 1]>::try_from(select.projection) {
        Ok([SelectItem::UnnamedExpr(expr)]) => Ok(expr),
        _ => Err(ParseError::NotAnExpression(sql.to_string())),
    }
}

/// Parse a boolean predicate as it would appear in a WHERE clause.
pub fn parse_condition(sql: &str, dialect: Dialect) -> Result<SqlExpr, ParseError> {
    let select = parse_select(&format!("SELECT * FROM _predicate WHERE {sql}"), dialect)?;
    if select.having.is_some() {
        return Err(ParseError::NotAnExpression(sql.to_string()));
    }
    select
        .selection
        .ok_or_else(|| ParseError::NotAnExpression(sql.to_string()))
}

/// Re-render a query in canonical form.
pub fn normalize_query(sql: &str, dialect: Dialect) -> Result<String, ParseError> {
    Ok(parse_query(sql, dialect)?.to_string())
}

// =============================================================================
// Analysis
// =============================================================================

/// Is `name` an aggregate function?
pub fn is_aggregate_function(name: &str) -> bool {
    matches!(
        name.to_uppercase().as_str(),
        "COUNT"
            | "COUNT_IF"
            | "COUNTIF"
            | "SUM"
            | "AVG"
            | "MIN"
            | "MAX"
            | "MEDIAN"
            | "MODE"
            | "STDDEV"
            | "STDDEV_POP"
            | "STDDEV_SAMP"
            | "VARIANCE"
            | "VAR_POP"
            | "VAR_SAMP"
            | "CORR"
            | "COVAR_POP"
            | "COVAR_SAMP"
            | "PERCENTILE_CONT"
            | "PERCENTILE_DISC"
            | "QUANTILE"
            | "QUANTILE_CONT"
            | "QUANTILE_DISC"
            | "APPROX_COUNT_DISTINCT"
            | "APPROX_DISTINCT"
            | "ARRAY_AGG"
            | "STRING_AGG"
            | "GROUP_CONCAT"
            | "LISTAGG"
            | "BOOL_AND"
            | "BOOL_OR"
            | "EVERY"
            | "ANY_VALUE"
            | "ARG_MAX"
            | "ARG_MIN"
            | "ARGMAX"
            | "ARGMIN"
            | "MAX_BY"
            | "MIN_BY"
            | "BIT_AND"
            | "BIT_OR"
            | "BIT_XOR"
    )
}

fn function_name(f: &ast::Function) -> String {
    f.name
        .0
        .last()
        .map(|ident| ident.value.to_uppercase())
        .unwrap_or_default()
}

fn covers_columns(f: &ast::Function) -> bool {
    f.over.is_some() || is_aggregate_function(&function_name(f))
}

/// Is `ident` an unquoted date or time unit, as in `DATEADD(day, 1, x)` or
/// `DATE_TRUNC(x, MONTH)`?
///
/// `sqlparser` reads these arguments as plain identifiers.
pub fn is_date_part(ident: &Ident) -> bool {
    ident.quote_style.is_none()
        && matches!(
            ident.value.to_uppercase().as_str(),
            "MICROSECOND"
                | "MICROSECONDS"
                | "MILLISECOND"
                | "MILLISECONDS"
                | "SECOND"
                | "SECONDS"
                | "MINUTE"
                | "MINUTES"
                | "HOUR"
                | "HOURS"
                | "DAY"
                | "DAYS"
                | "DAYOFWEEK"
                | "DAYOFYEAR"
                | "WEEK"
                | "WEEKS"
                | "ISOWEEK"
                | "MONTH"
                | "MONTHS"
                | "QUARTER"
                | "QUARTERS"
                | "YEAR"
                | "YEARS"
                | "ISOYEAR"
                | "DD"
                | "MM"
                | "YY"
                | "YYYY"
                | "QQ"
                | "WK"
                | "HH"
                | "MI"
                | "SS"
        )
}

/// A column reference found in an expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// Shape of a parsed expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprAnalysis {
    /// Aggregate calls that are not themselves windowed.
    pub aggregates: usize,
    pub windows: usize,
    pub columns: Vec<ColumnRef>,
    /// Columns outside every aggregate or window call.
    pub naked_columns: Vec<ColumnRef>,
}

impl ExprAnalysis {
    pub fn has_aggregate(&self) -> bool {
        self.aggregates > 0
    }

    pub fn has_window(&self) -> bool {
        self.windows > 0
    }

    /// No columns and no aggregate or window calls.
    pub fn is_constant(&self) -> bool {
        self.columns.is_empty() && self.aggregates == 0 && self.windows == 0
    }
}

#[derive(Default)]
struct Analyzer {
    analysis: ExprAnalysis,
    covered_depth: usize,
}

impl Analyzer {
    fn record(&mut self, column: ColumnRef) {
        if self.covered_depth == 0 {
            self.analysis.naked_columns.push(column.clone());
        }
        self.analysis.columns.push(column);
    }
}

impl Visitor for Analyzer {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &SqlExpr) -> ControlFlow<Self::Break> {
        match expr {
            SqlExpr::Function(f) => {
                if f.over.is_some() {
                    self.analysis.windows += 1;
                } else if is_aggregate_function(&function_name(f)) {
                    self.analysis.aggregates += 1;
                }
                if covers_columns(f) {
                    self.covered_depth += 1;
                }
            }
            SqlExpr::Identifier(ident) if is_date_part(ident) => {}
            SqlExpr::Identifier(ident) => self.record(ColumnRef {
                table: None,
                column: ident.value.clone(),
            }),
            SqlExpr::CompoundIdentifier(parts) => {
                if let Some((column, tables)) = parts.split_last() {
                    let table = tables
                        .iter()
                        .map(|i| i.value.as_str())
                        .collect::<Vec<_>>()
                        .join(".");
                    self.record(ColumnRef {
                        table: Some(table),
                        column: column.value.clone(),
                    });
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, expr: &SqlExpr) -> ControlFlow<Self::Break> {
        if let SqlExpr::Function(f) = expr {
            if covers_columns(f) {
                self.covered_depth = self.covered_depth.saturating_sub(1);
            }
        }
        ControlFlow::Continue(())
    }
}

/// Column name when the whole expression is one column reference.
pub fn bare_column(expr: &SqlExpr) -> Option<&str> {
    match expr {
        SqlExpr::Identifier(ident) => Some(&ident.value),
        SqlExpr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.as_str()),
        SqlExpr::Nested(inner) => bare_column(inner),
        _ => None,
    }
}

/// Classify an expression.
pub fn analyze(expr: &SqlExpr) -> ExprAnalysis {
    let mut analyzer = Analyzer::default();
    let _ = Visit::visit(expr, &mut analyzer);
    analyzer.analysis
}

// =============================================================================
// Qualification
// =============================================================================

/// Columns visible to an expression, keyed by table alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<I, S>(mut self, alias: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_table(alias, columns);
        self
    }

    pub fn add_table<I, S>(&mut self, alias: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tables.entry(alias.into()).or_default().extend(
            columns
                .into_iter()
                .map(|c| c.as_ref().to_lowercase()),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Whether any table declares `column`.
    pub fn declares(&self, column: &str) -> bool {
        let lower = column.to_lowercase();
        self.tables.values().any(|columns| columns.contains(&lower))
    }

    /// Table alias matching `name` case-insensitively, in its declared spelling.
    pub fn table(&self, name: &str) -> Option<&str> {
        self.tables
            .keys()
            .find(|t| t.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// The table that owns `column`.
    ///
    /// A column no table declares belongs to the only table in a
    /// single-table scope and stays unqualified otherwise.
    pub fn owner_of(&self, column: &str) -> Result<Option<&str>, ParseError> {
        let lower = column.to_lowercase();
        let owners: Vec<&str> = self
            .tables
            .iter()
            .filter(|(_, columns)| columns.contains(&lower))
            .map(|(table, _)| table.as_str())
            .collect();

        match owners.as_slice() {
            [] if self.tables.len() == 1 => Ok(self.tables.keys().next().map(String::as_str)),
            [] => Ok(None),
            [owner] => Ok(Some(owner)),
            _ => Err(ParseError::AmbiguousColumn {
                column: column.to_string(),
                tables: owners.into_iter().map(String::from).collect(),
            }),
        }
    }
}

struct Qualifier<'a> {
    scope: &'a Scope,
    dialect: Dialect,
}

impl Qualifier<'_> {
    fn quote(&self, ident: &Ident) -> Ident {
        let value = match ident.quote_style {
            Some(_) => ident.value.clone(),
            None => self.dialect.normalize_identifier(&ident.value),
        };
        let mut quoted = Ident::new(value);
        quoted.quote_style = Some(self.dialect.quote_char());
        quoted
    }

    fn quote_table(&self, ident: &Ident) -> Ident {
        match self.scope.table(&ident.value) {
            Some(table) => {
                let mut quoted = Ident::new(table);
                quoted.quote_style = Some(self.dialect.quote_char());
                quoted
            }
            None => self.quote(ident),
        }
    }
}

impl VisitorMut for Qualifier<'_> {
    type Break = ParseError;

    fn post_visit_expr(&mut self, expr: &mut SqlExpr) -> ControlFlow<Self::Break> {
        match expr {
            // Units stay keywords unless a table really has such a column.
            SqlExpr::Identifier(ident) if is_date_part(ident) && !self.scope.declares(&ident.value) => {}
            SqlExpr::Identifier(ident) => {
                let owner = match self.scope.owner_of(&ident.value) {
                    Ok(owner) => owner,
                    Err(e) => return ControlFlow::Break(e),
                };
                let column = self.quote(ident);
                *expr = match owner {
                    Some(table) => SqlExpr::CompoundIdentifier(vec![
                        self.quote_table(&Ident::new(table)),
                        column,
                    ]),
                    None => SqlExpr::Identifier(column),
                };
            }
            SqlExpr::CompoundIdentifier(parts) => {
                let last = parts.len().saturating_sub(1);
                for (i, part) in parts.iter_mut().enumerate() {
                    *part = if i == last {
                        self.quote(part)
                    } else {
                        self.quote_table(part)
                    };
                }
            }
            SqlExpr::Function(f) => {
                if f.name.0.len() == 1 {
                    if let Some(remapped) = f
                        .name
                        .0
                        .first()
                        .and_then(|ident| self.dialect.remap_function(&ident.value))
                    {
                        f.name.0[0] = Ident::new(remapped);
                    }
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Qualify bare columns from `scope`, quote every identifier and remap
/// function names for `dialect`, in place.
pub fn qualify(expr: &mut SqlExpr, scope: &Scope, dialect: Dialect) -> Result<(), ParseError> {
    let mut qualifier = Qualifier { scope, dialect };
    match VisitMut::visit(expr, &mut qualifier) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(e) => Err(e),
    }
}

/// Render an expression qualified against `scope`.
///
/// Falls back to quoting without qualification when a column is
/// ambiguous.
pub fn render_qualified(expr: &SqlExpr, scope: &Scope, dialect: Dialect) -> String {
    let mut qualified = expr.clone();
    match qualify(&mut qualified, scope, dialect) {
        Ok(()) => qualified.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, expr = %expr, "qualification failed, using unqualified expression");
            let mut plain = expr.clone();
            match qualify(&mut plain, &Scope::new(), dialect) {
                Ok(()) => plain.to_string(),
                Err(_) => expr.to_string(),
            }
        }
    }
}

struct Prefixer<'a> {
    table: &'a str,
}

impl VisitorMut for Prefixer<'_> {
    type Break = ();

    fn post_visit_expr(&mut self, expr: &mut SqlExpr) -> ControlFlow<Self::Break> {
        if let SqlExpr::Identifier(ident) = expr {
            if is_date_part(ident) {
                return ControlFlow::Continue(());
            }
            let column = ident.clone();
            *expr = SqlExpr::CompoundIdentifier(vec![Ident::new(self.table), column]);
        }
        ControlFlow::Continue(())
    }
}

/// Prefix every bare column in `sql` with `table`.
///
/// Text that does not parse is returned unchanged.
pub fn prefix_columns(sql: &str, table: &str, dialect: Dialect) -> String {
    match parse_expression(sql, dialect) {
        Ok(mut expr) => {
            let _ = VisitMut::visit(&mut expr, &mut Prefixer { table });
            expr.to_string()
        }
        Err(_) => sql.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(sql: &str) -> ExprAnalysis {
        analyze(&parse_expression(sql, Dialect::DuckDb).unwrap())
    }

    #[test]
    fn test_parse_expression_rejects_trailing_clauses() {
        assert!(parse_expression("amount FROM t", Dialect::DuckDb).is_err());
        assert!(parse_expression("SUM(", Dialect::DuckDb).is_err());
        assert!(parse_expression("SUM(amount) / 2", Dialect::DuckDb).is_ok());
    }

    #[test]
    fn test_analyze_aggregate() {
        let a = analysis("SUM(amount)");
        assert!(a.has_aggregate());
        assert!(a.naked_columns.is_empty());
        assert_eq!(a.columns.len(), 1);
    }

    #[test]
    fn test_analyze_naked_column() {
        let a = analysis("amount + SUM(tax)");
        assert!(a.has_aggregate());
        assert_eq!(a.naked_columns, vec![ColumnRef { table: None, column: "amount".into() }]);
    }

    #[test]
    fn test_analyze_window_is_not_aggregate() {
        let a = analysis("ROW_NUMBER() OVER (PARTITION BY region ORDER BY amount)");
        assert!(!a.has_aggregate());
        assert!(a.has_window());
        assert!(a.naked_columns.is_empty());

        let windowed_sum = analysis("SUM(amount) OVER (PARTITION BY region)");
        assert!(!windowed_sum.has_aggregate());
        assert!(windowed_sum.has_window());
    }

    #[test]
    fn test_analyze_constant() {
        assert!(analysis("'values'").is_constant());
        assert!(!analysis("region").is_constant());
    }

    #[test]
    fn test_bare_column() {
        let parsed = parse_expression("(orders_cte.amount)", Dialect::DuckDb).unwrap();
        assert_eq!(bare_column(&parsed), Some("amount"));
        let parsed = parse_expression("amount + 1", Dialect::DuckDb).unwrap();
        assert_eq!(bare_column(&parsed), None);
    }

    #[test]
    fn test_qualify_single_table_scope() {
        let expr = parse_expression("SUM(amount)", Dialect::DuckDb).unwrap();
        let scope = Scope::new().with_table("base_model", Vec::<String>::new());
        assert_eq!(
            render_qualified(&expr, &scope, Dialect::DuckDb),
            "SUM(\"base_model\".\"amount\")"
        );
    }

    #[test]
    fn test_qualify_uses_owner() {
        let expr = parse_expression("username", Dialect::Postgres).unwrap();
        let scope = Scope::new()
            .with_table("orders_cte", ["amount"])
            .with_table("users_cte", ["username"]);
        assert_eq!(
            render_qualified(&expr, &scope, Dialect::Postgres),
            "\"users_cte\".\"username\""
        );
    }

    #[test]
    fn test_qualify_ambiguous_falls_back() {
        let expr = parse_expression("id", Dialect::DuckDb).unwrap();
        let scope = Scope::new()
            .with_table("orders_cte", ["id"])
            .with_table("users_cte", ["id"]);
        let mut probe = expr.clone();
        assert!(matches!(
            qualify(&mut probe, &scope, Dialect::DuckDb),
            Err(ParseError::AmbiguousColumn { .. })
        ));
        assert_eq!(render_qualified(&expr, &scope, Dialect::DuckDb), "\"id\"");
    }

    #[test]
    fn test_qualify_keeps_scope_table_spelling() {
        let expr = parse_expression("orders_cte.Amount", Dialect::Snowflake).unwrap();
        let scope = Scope::new()
            .with_table("orders_cte", ["amount"])
            .with_table("users_cte", ["id"]);
        assert_eq!(
            render_qualified(&expr, &scope, Dialect::Snowflake),
            "\"orders_cte\".\"AMOUNT\""
        );
    }

    #[test]
    fn test_qualify_remaps_functions() {
        let expr = parse_expression("NVL(amount, 0)", Dialect::DuckDb).unwrap();
        assert_eq!(
            render_qualified(&expr, &Scope::new(), Dialect::DuckDb),
            "COALESCE(\"amount\", 0)"
        );
    }

    #[test]
    fn test_prefix_columns() {
        assert_eq!(
            prefix_columns("SUM(amount)", "orders_cte", Dialect::DuckDb),
            "SUM(orders_cte.amount)"
        );
        assert_eq!(
            prefix_columns("SUM(", "orders_cte", Dialect::DuckDb),
            "SUM("
        );
    }

    #[test]
    fn test_qualify_leaves_date_parts() {
        let scope = Scope::new().with_table("base_model", ["created_at"]);
        let expr = parse_expression("DATEADD(day, 1, created_at)", Dialect::Snowflake).unwrap();
        assert_eq!(
            render_qualified(&expr, &scope, Dialect::Snowflake),
            "DATEADD(day, 1, \"base_model\".\"CREATED_AT\")"
        );
        assert_eq!(
            analyze(&expr).columns,
            vec![ColumnRef { table: None, column: "created_at".into() }]
        );
    }

    #[test]
    fn test_qualify_declared_date_part_column() {
        let scope = Scope::new().with_table("events_cte", ["day"]);
        let expr = parse_expression("day", Dialect::DuckDb).unwrap();
        assert_eq!(
            render_qualified(&expr, &scope, Dialect::DuckDb),
            "\"events_cte\".\"day\""
        );
        assert!(!is_date_part(&Ident::with_quote('"', "day")));
    }

    #[test]
    fn test_prefix_columns_skips_date_parts() {
        assert_eq!(
            prefix_columns("DATEDIFF(day, started_at, ended_at)", "orders_cte", Dialect::TSql),
            "DATEDIFF(day, orders_cte.started_at, orders_cte.ended_at)"
        );
    }

    #[test]
    fn test_parse_condition() {
        let cond = parse_condition("a.x = b.y AND a.z > 1", Dialect::DuckDb).unwrap();
        assert_eq!(analyze(&cond).columns.len(), 3);
    }
}
