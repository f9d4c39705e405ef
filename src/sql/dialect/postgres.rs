//! PostgreSQL.

use super::helpers::{self, FunctionMap};
use super::{IdentifierCase, SqlDialect};

pub(super) const FUNCTIONS: FunctionMap = &[
    (&["STRFTIME", "DATE_FORMAT"], "TO_CHAR"),
    (&["NVL", "IFNULL", "ISNULL"], "COALESCE"),
];

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Lower
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, FUNCTIONS)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::PostgreSqlDialect {})
    }
}
