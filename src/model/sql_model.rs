//! SQL-producing models and the metrics and dimensions they own.

use serde::{Deserialize, Serialize};

use super::types::DataType;

/// A named row-level SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    /// SQL expression, may contain `${ref(...)}` tokens.
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            data_type: None,
            description: None,
        }
    }

    /// A dimension that selects a column of the same name.
    pub fn column(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            expression: name.clone(),
            name,
            data_type: Some(data_type.into()),
            description: None,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Canonical type, `VARCHAR` when none is declared.
    pub fn canonical_type(&self) -> DataType {
        self.data_type
            .as_deref()
            .map(DataType::from_name)
            .unwrap_or(DataType::Varchar)
    }
}

/// A named aggregate SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    /// SQL expression, may reference other metrics via `${ref(...)}`.
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Metric {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A named unit of SQL that produces a tabular result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub sql: String,
    /// Reference to the source this model reads from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    /// Dimensions derived from introspected columns.
    #[serde(skip)]
    pub implicit_dimensions: Vec<Dimension>,
}

impl Model {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            source: None,
            metrics: Vec::new(),
            dimensions: Vec::new(),
            implicit_dimensions: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_implicit_dimension(mut self, dimension: Dimension) -> Self {
        self.implicit_dimensions.push(dimension);
        self
    }

    /// Attach dimensions discovered by schema extraction.
    ///
    /// Columns already declared as explicit dimensions are skipped.
    pub fn attach_implicit_dimensions(&mut self, dimensions: impl IntoIterator<Item = Dimension>) {
        for dim in dimensions {
            let declared = self.dimensions.iter().any(|d| d.name == dim.name)
                || self.implicit_dimensions.iter().any(|d| d.name == dim.name);
            if !declared {
                self.implicit_dimensions.push(dim);
            }
        }
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Explicit dimension by name, falling back to implicit ones.
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .or_else(|| self.implicit_dimensions.iter().find(|d| d.name == name))
    }

    /// Implicit dimensions first, then explicit ones.
    pub fn all_dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.implicit_dimensions.iter().chain(self.dimensions.iter())
    }
}
