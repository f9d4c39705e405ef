//! Column type schema derived from model dimensions.
//!
//! Every model contributes its explicit and implicit dimensions, typed via
//! [`DataType::from_name`]. Each model is registered under its raw name and
//! its CTE alias; the base model is also registered as `base_model`.

use std::collections::BTreeMap;

use super::cte::CteBuilder;
use super::cte::BASE_MODEL_ALIAS;
use crate::model::{DataType, Model, Project};
use crate::sql::Scope;

/// Column name to canonical type.
pub type ColumnTypes = BTreeMap<String, DataType>;

/// Table name or alias to column types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeSchema {
    tables: BTreeMap<String, ColumnTypes>,
}

impl TypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for every model in the project.
    pub fn from_project(project: &Project, ctes: &CteBuilder<'_>, base_model: Option<&str>) -> Self {
        let mut schema = Self::new();
        for model in &project.models {
            let columns = model_columns(model);
            if base_model == Some(model.name.as_str()) {
                schema.insert(BASE_MODEL_ALIAS, columns.clone());
            }
            schema.insert(&ctes.alias(&model.name), columns.clone());
            schema.insert(&model.name, columns);
        }
        schema
    }

    pub fn insert(&mut self, table: &str, columns: ColumnTypes) {
        self.tables.entry(table.to_string()).or_default().extend(columns);
    }

    pub fn table(&self, name: &str) -> Option<&ColumnTypes> {
        self.tables.get(name)
    }

    pub fn column_type(&self, table: &str, column: &str) -> Option<&DataType> {
        self.tables.get(table)?.get(column)
    }

    /// Qualification scope over the tables a query actually reads.
    ///
    /// Aliases missing from the schema are still in scope, with no known
    /// columns.
    pub fn scope<S: AsRef<str>>(&self, aliases: &[S]) -> Scope {
        let mut scope = Scope::new();
        for alias in aliases {
            let alias = alias.as_ref();
            let columns = self.tables.get(alias).into_iter().flat_map(|c| c.keys());
            scope.add_table(alias, columns);
        }
        scope
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn model_columns(model: &Model) -> ColumnTypes {
    model
        .all_dimensions()
        .map(|d| (d.name.clone(), d.canonical_type()))
        .collect()
}
