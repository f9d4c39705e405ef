//! Snowflake. Unquoted identifiers resolve as uppercase, so columns are
//! folded before quoting.

use super::helpers::{self, FunctionMap};
use super::{IdentifierCase, SqlDialect};

const FUNCTIONS: FunctionMap = &[
    (&["STRFTIME", "DATE_FORMAT"], "TO_CHAR"),
    (&["IFNULL", "ISNULL"], "NVL"),
];

#[derive(Debug, Clone, Copy)]
pub struct Snowflake;

impl SqlDialect for Snowflake {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Upper
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, FUNCTIONS)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::SnowflakeDialect {})
    }
}
