//! BigQuery.
//!
//! Column names are case-sensitive and kept as written.

use super::helpers::{self, FunctionMap};
use super::SqlDialect;

const FUNCTIONS: FunctionMap = &[
    (&["STRFTIME", "TO_CHAR", "DATE_FORMAT"], "FORMAT_TIMESTAMP"),
    (&["NVL", "ISNULL"], "IFNULL"),
    (&["LENGTH"], "CHAR_LENGTH"),
];

#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, FUNCTIONS)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::BigQueryDialect {})
    }
}
