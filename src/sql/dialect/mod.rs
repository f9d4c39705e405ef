//! SQL dialects.
//!
//! Each dialect implements [`SqlDialect`] and describes how compiled
//! queries look on that engine:
//!
//! - Identifier quoting: `"` (Postgres, DuckDB, Snowflake, Redshift, SQLite),
//!   `` ` `` (MySQL, BigQuery, Databricks), `[]` (T-SQL)
//! - Case folding of unquoted identifiers
//! - Row limits: LIMIT vs OFFSET FETCH
//! - GROUP BY by alias or by expression
//! - Function names (NVL vs COALESCE vs ISNULL)
//! - The `sqlparser` dialect used to read expressions
//!
//! # Usage
//!
//! ```
//! use sqlweave::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect: Dialect = "postgresql".parse().unwrap();
//! assert_eq!(dialect.quote_identifier("user"), "\"user\"");
//! ```

mod bigquery;
mod databricks;
mod duckdb;
pub mod helpers;
mod mysql;
mod postgres;
mod redshift;
mod snowflake;
mod sqlite;
mod tsql;

use std::str::FromStr;

pub use bigquery::BigQuery;
pub use databricks::Databricks;
pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use redshift::Redshift;
pub use snowflake::Snowflake;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use super::token::TokenStream;

/// What an engine does to an unquoted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierCase {
    #[default]
    Preserve,
    Lower,
    Upper,
}

impl IdentifierCase {
    pub fn apply(self, ident: &str) -> String {
        match self {
            IdentifierCase::Preserve => ident.to_string(),
            IdentifierCase::Lower => ident.to_lowercase(),
            IdentifierCase::Upper => ident.to_uppercase(),
        }
    }
}

/// How compiled SQL is rendered for one engine.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifiers
    // =========================================================================

    /// Opening quote character, as `sqlparser` records it on an `Ident`.
    fn quote_char(&self) -> char;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_with(ident, self.quote_char())
    }

    fn identifier_case(&self) -> IdentifierCase {
        IdentifierCase::Preserve
    }

    /// Case folding applied to an unquoted identifier before it is quoted.
    ///
    /// Quoting makes identifiers case-sensitive, so the folded form must be
    /// what the database would have resolved the bare name to.
    fn normalize_identifier(&self, ident: &str) -> String {
        self.identifier_case().apply(ident)
    }

    // =========================================================================
    // Row limit
    // =========================================================================

    /// Clause capping the result at `limit` rows.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        helpers::emit_limit_standard(limit)
    }

    /// Whether the limit clause is only legal after an ORDER BY.
    fn limit_requires_order_by(&self) -> bool {
        false
    }

    // =========================================================================
    // Grouping
    // =========================================================================

    /// Whether GROUP BY may name a SELECT alias.
    ///
    /// T-SQL evaluates GROUP BY before the SELECT list and needs the
    /// expressions themselves.
    fn supports_group_by_alias(&self) -> bool {
        true
    }

    // =========================================================================
    // Functions and parsing
    // =========================================================================

    /// Name to use for a function written as `name`, if it differs here.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }

    /// The `sqlparser` dialect used to read expressions and model SQL.
    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect>;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    DuckDb,
    Postgres,
    Snowflake,
    BigQuery,
    MySql,
    Sqlite,
    TSql,
    Redshift,
    Databricks,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
            Dialect::Snowflake => &Snowflake,
            Dialect::BigQuery => &BigQuery,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
            Dialect::TSql => &TSql,
            Dialect::Redshift => &Redshift,
            Dialect::Databricks => &Databricks,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_char(&self) -> char {
        self.dialect().quote_char()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn identifier_case(&self) -> IdentifierCase {
        self.dialect().identifier_case()
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn limit_requires_order_by(&self) -> bool {
        self.dialect().limit_requires_order_by()
    }

    fn supports_group_by_alias(&self) -> bool {
        self.dialect().supports_group_by_alias()
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        self.dialect().parser_dialect()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised dialect name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown SQL dialect: '{0}'")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    /// Accepts the names trace sources use for their engine.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "duckdb" => Ok(Dialect::DuckDb),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "snowflake" => Ok(Dialect::Snowflake),
            "bigquery" => Ok(Dialect::BigQuery),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            "tsql" | "mssql" | "sqlserver" => Ok(Dialect::TSql),
            "redshift" => Ok(Dialect::Redshift),
            "databricks" | "spark" => Ok(Dialect::Databricks),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Dialect {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for Dialect {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
