//! CTE construction for model SQL.
//!
//! Model SQL is parsed in the target dialect and embedded in canonical
//! form. SQL the parser rejects is embedded as written.

use crate::semantic::sanitize::NameSanitizer;
use crate::sql::parse;
use crate::sql::{Cte, Dialect};

/// CTE alias of the base model in single-model queries.
pub const BASE_MODEL_ALIAS: &str = "base_model";

/// Builds one CTE per model.
#[derive(Debug, Clone, Copy)]
pub struct CteBuilder<'s> {
    dialect: Dialect,
    sanitizer: &'s NameSanitizer,
    suffix: &'s str,
}

impl<'s> CteBuilder<'s> {
    pub fn new(dialect: Dialect, sanitizer: &'s NameSanitizer, suffix: &'s str) -> Self {
        Self {
            dialect,
            sanitizer,
            suffix,
        }
    }

    /// Alias of a model's CTE in multi-model queries.
    pub fn alias(&self, model: &str) -> String {
        self.sanitizer.get_alias(model, self.suffix)
    }

    /// `base_model AS (<sql>)`.
    pub fn base(&self, sql: &str) -> Cte {
        Cte::raw(BASE_MODEL_ALIAS, &self.body(BASE_MODEL_ALIAS, sql))
    }

    /// `{model}_cte AS (<sql>)`.
    pub fn model(&self, model: &str, sql: &str) -> Cte {
        Cte::raw(&self.alias(model), &self.body(model, sql))
    }

    fn body(&self, model: &str, sql: &str) -> String {
        match parse::normalize_query(sql, self.dialect) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::debug!(model = %model, error = %e, "model SQL did not parse, embedding as written");
                sql.trim().trim_end_matches(';').trim_end().to_string()
            }
        }
    }
}
