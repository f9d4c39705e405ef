//! T-SQL (SQL Server, Azure SQL).
//!
//! Pagination is `OFFSET .. FETCH`, which needs an ORDER BY, and GROUP BY
//! cannot see SELECT aliases.

use super::helpers::{self, FunctionMap};
use super::SqlDialect;
use crate::sql::token::TokenStream;

const FUNCTIONS: FunctionMap = &[
    (&["LENGTH"], "LEN"),
    (&["SUBSTR"], "SUBSTRING"),
    (&["NOW"], "GETDATE"),
    (&["STRFTIME", "TO_CHAR", "DATE_FORMAT"], "FORMAT"),
    (&["NVL", "IFNULL"], "ISNULL"),
];

#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_char(&self) -> char {
        '['
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        helpers::emit_limit_fetch(limit)
    }

    fn limit_requires_order_by(&self) -> bool {
        true
    }

    fn supports_group_by_alias(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, FUNCTIONS)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::MsSqlDialect {})
    }
}
