//! Round-trip check for emitted SQL: whatever the compiler writes for a
//! dialect must parse back with that dialect's `sqlparser` grammar.

use sqlparser::parser::Parser;

use super::dialect::{Dialect, SqlDialect};

/// `Err` carries the parser message and the offending SQL.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    Parser::parse_sql(&*dialect.parser_dialect(), sql)
        .map(|_| ())
        .map_err(|e| format!("{dialect} rejected emitted SQL: {e}\n{sql}"))
}
