//! MySQL.

use super::helpers::{self, FunctionMap};
use super::SqlDialect;

const FUNCTIONS: FunctionMap = &[
    (&["STRFTIME", "TO_CHAR"], "DATE_FORMAT"),
    (&["NVL", "ISNULL"], "IFNULL"),
    (&["SUBSTR"], "SUBSTRING"),
];

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, FUNCTIONS)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::MySqlDialect {})
    }
}
