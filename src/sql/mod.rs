//! SQL reading and writing.
//!
//! - [`parse`] reads expressions with `sqlparser`, classifies them and
//!   qualifies their columns
//! - [`query`] and [`expr`] hold the statement a trace compiles to
//! - [`token`] is the flat output form
//! - [`dialect`] covers what differs between engines

pub mod dialect;
pub mod expr;
pub mod parse;
pub mod query;
pub mod token;

pub mod test_utils;

pub use dialect::{Dialect, SqlDialect, UnknownDialect};
pub use expr::{col, conjunction, raw_sql, Expr, ExprExt};
pub use parse::{ExprAnalysis, ParseError, Scope};
pub use query::{Cte, Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir};
pub use token::{Token, TokenStream};
