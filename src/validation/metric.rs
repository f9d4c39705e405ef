//! Shape checks for metric, dimension and join-condition expressions.

use super::ValidationResult;
use crate::semantic::refs;
use crate::semantic::sanitize::NameSanitizer;
use crate::sql::parse::{self, ColumnRef, ExprAnalysis};
use crate::sql::Dialect;

/// Checks expression shape before any query is built.
///
/// Remaining `${ref(model).field}` tokens are rewritten to
/// `sanitized_model.field` before parsing.
#[derive(Debug, Default)]
pub struct MetricValidator {
    dialect: Dialect,
    sanitizer: NameSanitizer,
}

impl MetricValidator {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sanitizer: NameSanitizer::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Every column must sit inside an aggregate, and there must be at
    /// least one aggregate.
    pub fn validate_aggregate_expression(&self, expression: &str) -> ValidationResult {
        let analysis = match self.analyze_expression(expression, "metric") {
            Ok(analysis) => analysis,
            Err(result) => return result,
        };

        if let Some(column) = analysis.naked_columns.first() {
            return ValidationResult::fail(format!(
                "column '{}' must be inside an aggregate function in '{}'",
                column,
                expression.trim()
            ));
        }
        if !analysis.has_aggregate() {
            return ValidationResult::fail(format!(
                "metric expression '{}' has no aggregate function",
                expression.trim()
            ));
        }
        ValidationResult::ok()
    }

    /// A dimension is a row-level expression: no aggregates.
    pub fn validate_dimension_expression(&self, expression: &str) -> ValidationResult {
        let analysis = match self.analyze_expression(expression, "dimension") {
            Ok(analysis) => analysis,
            Err(result) => return result,
        };

        if analysis.has_aggregate() {
            return ValidationResult::fail(format!(
                "dimension expression '{}' must not contain an aggregate function",
                expression.trim()
            ));
        }
        ValidationResult::ok()
    }

    /// A join condition must name both models and no aggregates.
    pub fn validate_join_condition(&self, condition: &str, left_model: &str, right_model: &str) -> ValidationResult {
        if condition.trim().is_empty() {
            return ValidationResult::fail("join condition is empty");
        }
        let rewritten = self.rewrite_refs(condition);
        let parsed = match parse::parse_condition(&rewritten, self.dialect) {
            Ok(parsed) => parsed,
            Err(e) => return parse_failure("join condition", condition, &e.to_string()),
        };
        let analysis = parse::analyze(&parsed);

        if analysis.has_aggregate() {
            return ValidationResult::fail(format!(
                "join condition '{}' must not contain an aggregate function",
                condition.trim()
            ));
        }
        for model in [left_model, right_model] {
            let table = self.sanitizer.sanitize(model);
            if !references_table(&analysis.columns, &table) {
                return ValidationResult::fail(format!(
                    "join condition '{}' does not reference model '{}'",
                    condition.trim(),
                    model
                ));
            }
        }
        ValidationResult::ok()
    }

    fn analyze_expression(&self, expression: &str, kind: &str) -> Result<ExprAnalysis, ValidationResult> {
        if expression.trim().is_empty() {
            return Err(ValidationResult::fail(format!("{} expression is empty", kind)));
        }
        let rewritten = self.rewrite_refs(expression);
        parse::parse_expression(&rewritten, self.dialect)
            .map(|parsed| parse::analyze(&parsed))
            .map_err(|e| parse_failure(&format!("{} expression", kind), expression, &e.to_string()))
    }

    fn rewrite_refs(&self, text: &str) -> String {
        refs::replace_refs(text, |entity, path| {
            let table = self.sanitizer.sanitize(entity);
            match path {
                Some(p) => format!("{}.{}", table, p),
                None => table,
            }
        })
    }
}

/// Parse failures on text still holding `${...}` are reference leftovers.
fn parse_failure(what: &str, text: &str, error: &str) -> ValidationResult {
    if text.contains("${") {
        ValidationResult::fail(format!(
            "invalid SQL syntax in {} '{}': malformed reference",
            what,
            text.trim()
        ))
    } else {
        ValidationResult::fail(format!("could not parse {} '{}': {}", what, text.trim(), error))
    }
}

fn references_table(columns: &[ColumnRef], table: &str) -> bool {
    columns.iter().any(|c| {
        c.table
            .as_deref()
            .and_then(|t| t.rsplit('.').next())
            .is_some_and(|t| t.eq_ignore_ascii_case(table))
    })
}
