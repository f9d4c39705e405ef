//! Databricks (Spark SQL).

use super::helpers::{self, FunctionMap};
use super::SqlDialect;

const FUNCTIONS: FunctionMap = &[
    (&["TO_CHAR", "STRFTIME"], "DATE_FORMAT"),
    (&["NVL", "ISNULL", "IFNULL"], "COALESCE"),
];

#[derive(Debug, Clone, Copy)]
pub struct Databricks;

impl SqlDialect for Databricks {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, FUNCTIONS)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::DatabricksDialect {})
    }
}
