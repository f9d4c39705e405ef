//! SQLite.

use super::helpers::{self, FunctionMap};
use super::SqlDialect;

const FUNCTIONS: FunctionMap = &[
    (&["TO_CHAR", "DATE_FORMAT"], "STRFTIME"),
    (&["NVL", "ISNULL"], "IFNULL"),
    (&["SUBSTRING"], "SUBSTR"),
];

#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, FUNCTIONS)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::SQLiteDialect {})
    }
}
