//! The project tree: every typed entity the compiler can see.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::relation::Relation;
use super::sql_model::{Dimension, Metric, Model};

/// Error type for project loading.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to parse project YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse project JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate {kind} name: '{name}'")]
    DuplicateName { kind: &'static str, name: String },
}

/// A data source connection a model reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: None,
        }
    }

    pub fn with_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }
}

/// A query over one model, usually drawn by a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    /// Reference to the base model, e.g. `${ref(orders)}`.
    pub model: String,
}

impl Trace {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub name: String,
    /// References to traces.
    #[serde(default)]
    pub traces: Vec<String>,
}

impl Chart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traces: Vec::new(),
        }
    }

    pub fn with_trace(mut self, reference: impl Into<String>) -> Self {
        self.traces.push(reference.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub name: String,
    /// References to charts.
    #[serde(default)]
    pub charts: Vec<String>,
}

impl Dashboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            charts: Vec::new(),
        }
    }

    pub fn with_chart(mut self, reference: impl Into<String>) -> Self {
        self.charts.push(reference.into());
        self
    }
}

/// Whether an input selects one value or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Single,
    Multi,
}

/// A dashboard input whose value is read through `${name.accessor}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
}

impl Input {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: InputType::Single,
        }
    }

    pub fn multi(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: InputType::Multi,
        }
    }
}

/// The root of a parsed project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub sources: Vec<Source>,
    pub models: Vec<Model>,
    /// Project-level dimensions, not owned by any model.
    pub dimensions: Vec<Dimension>,
    /// Project-level metrics, may compose metrics of several models.
    pub metrics: Vec<Metric>,
    pub relations: Vec<Relation>,
    pub traces: Vec<Trace>,
    pub charts: Vec<Chart>,
    pub dashboards: Vec<Dashboard>,
    pub inputs: Vec<Input>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a project from YAML and check name uniqueness.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProjectError> {
        let project: Project = serde_yaml::from_str(yaml)?;
        project.check_unique_names()?;
        Ok(project)
    }

    /// Parse a project from JSON and check name uniqueness.
    pub fn from_json_str(json: &str) -> Result<Self, ProjectError> {
        let project: Project = serde_json::from_str(json)?;
        project.check_unique_names()?;
        Ok(project)
    }

    /// Model, relation, trace, chart and dashboard names must be unique.
    pub fn check_unique_names(&self) -> Result<(), ProjectError> {
        fn check<'a>(
            kind: &'static str,
            names: impl Iterator<Item = &'a str>,
        ) -> Result<(), ProjectError> {
            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(name) {
                    return Err(ProjectError::DuplicateName {
                        kind,
                        name: name.into(),
                    });
                }
            }
            Ok(())
        }

        check("model", self.models.iter().map(|m| m.name.as_str()))?;
        check("relation", self.relations.iter().map(|r| r.name.as_str()))?;
        check("trace", self.traces.iter().map(|t| t.name.as_str()))?;
        check("chart", self.charts.iter().map(|c| c.name.as_str()))?;
        check("dashboard", self.dashboards.iter().map(|d| d.name.as_str()))?;
        for model in &self.models {
            check("metric", model.metrics.iter().map(|m| m.name.as_str()))?;
            check("dimension", model.dimensions.iter().map(|d| d.name.as_str()))?;
        }
        Ok(())
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.traces.push(trace);
        self
    }

    pub fn with_chart(mut self, chart: Chart) -> Self {
        self.charts.push(chart);
        self
    }

    pub fn with_dashboard(mut self, dashboard: Dashboard) -> Self {
        self.dashboards.push(dashboard);
        self
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut Model> {
        self.models.iter_mut().find(|m| m.name == name)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.model(name).is_some()
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::query::JoinType;

    const PROJECT_YAML: &str = r#"
name: shop
sources:
  - name: warehouse
    type: duckdb
models:
  - name: orders
    sql: SELECT * FROM orders_table
    source: ${ref(warehouse)}
    dimensions:
      - name: region
        expression: UPPER(region)
        data_type: string
    metrics:
      - name: revenue
        expression: SUM(amount)
  - name: users
    sql: SELECT * FROM users_table
relations:
  - name: orders_users
    condition: ${ref(orders).user_id} = ${ref(users).id}
    join_type: left
inputs:
  - name: region_picker
    type: multi
"#;

    #[test]
    fn test_from_yaml() {
        let project = Project::from_yaml_str(PROJECT_YAML).unwrap();
        assert_eq!(project.name, "shop");
        assert_eq!(project.models.len(), 2);
        assert_eq!(project.relations[0].join_type, JoinType::Left);
        assert_eq!(project.sources[0].source_type.as_deref(), Some("duckdb"));
        assert_eq!(
            project.model("orders").and_then(|m| m.metric("revenue")).map(|m| m.expression.as_str()),
            Some("SUM(amount)")
        );
        assert_eq!(project.input("region_picker").map(|i| i.input_type), Some(InputType::Multi));
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let project = Project::new("p")
            .with_model(Model::new("orders", "SELECT 1"))
            .with_model(Model::new("orders", "SELECT 2"));
        let err = project.check_unique_names().unwrap_err();
        assert!(err.to_string().contains("Duplicate model name"));
    }
}
