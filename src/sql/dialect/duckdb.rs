//! DuckDB, the default target.

use super::helpers::{self, FunctionMap};
use super::{IdentifierCase, SqlDialect};

const FUNCTIONS: FunctionMap = &[
    (&["TO_CHAR", "DATE_FORMAT"], "STRFTIME"),
    (&["NVL", "IFNULL", "ISNULL"], "COALESCE"),
];

#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
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
        Box::new(sqlparser::dialect::DuckDbDialect {})
    }
}
