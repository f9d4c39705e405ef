//! The query description handed to the query builder.
//!
//! An upstream tokenizer turns a trace's props into raw SQL expressions.
//! What arrives here is mostly resolved SQL, but expressions may still hold
//! `${ref(...)}` metric or dimension tokens for the builder to finish.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Default `cohort_on` expression: one cohort for every row.
pub const DEFAULT_COHORT_ON: &str = "'values'";

/// Filters, either pre-classified or as a flat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterBy {
    /// Classified per expression by the builder.
    Flat(Vec<String>),
    /// `vanilla` goes to WHERE, `aggregate` goes to HAVING.
    Split {
        #[serde(default)]
        vanilla: Vec<String>,
        #[serde(default)]
        aggregate: Vec<String>,
    },
}

impl Default for FilterBy {
    fn default() -> Self {
        FilterBy::Split {
            vanilla: Vec::new(),
            aggregate: Vec::new(),
        }
    }
}

impl FilterBy {
    pub fn is_empty(&self) -> bool {
        match self {
            FilterBy::Flat(items) => items.is_empty(),
            FilterBy::Split { vanilla, aggregate } => vanilla.is_empty() && aggregate.is_empty(),
        }
    }
}

/// Resolved intermediate representation of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizedTrace {
    /// SQL of the base model.
    pub sql: String,
    /// Name of the base model. Required when other models are referenced.
    pub base_model: Option<String>,
    pub cohort_on: String,
    pub source: Option<String>,
    pub source_type: Option<String>,
    /// Output alias to SQL expression.
    pub select_items: BTreeMap<String, String>,
    pub filter_by: FilterBy,
    /// `"expr"`, `"expr ASC"` or `"expr DESC"`.
    pub order_by: Vec<String>,
    /// Models joined in addition to the base model.
    pub referenced_models: BTreeSet<String>,
    pub limit: Option<u64>,
}

impl Default for TokenizedTrace {
    fn default() -> Self {
        Self {
            sql: String::new(),
            base_model: None,
            cohort_on: DEFAULT_COHORT_ON.into(),
            source: None,
            source_type: None,
            select_items: BTreeMap::new(),
            filter_by: FilterBy::default(),
            order_by: Vec::new(),
            referenced_models: BTreeSet::new(),
            limit: None,
        }
    }
}

impl TokenizedTrace {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn with_base_model(mut self, model: impl Into<String>) -> Self {
        self.base_model = Some(model.into());
        self
    }

    pub fn with_cohort_on(mut self, expr: impl Into<String>) -> Self {
        self.cohort_on = expr.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>, source_type: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self.source_type = Some(source_type.into());
        self
    }

    pub fn select(mut self, alias: impl Into<String>, expr: impl Into<String>) -> Self {
        self.select_items.insert(alias.into(), expr.into());
        self
    }

    /// Add an unclassified filter.
    ///
    /// Switches the filter set to the flat form, carrying over any
    /// classified filters.
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        let mut items = match std::mem::take(&mut self.filter_by) {
            FilterBy::Flat(items) => items,
            FilterBy::Split {
                mut vanilla,
                aggregate,
            } => {
                vanilla.extend(aggregate);
                vanilla
            }
        };
        items.push(expr.into());
        self.filter_by = FilterBy::Flat(items);
        self
    }

    pub fn vanilla_filter(mut self, expr: impl Into<String>) -> Self {
        self.push_classified(expr.into(), false);
        self
    }

    pub fn aggregate_filter(mut self, expr: impl Into<String>) -> Self {
        self.push_classified(expr.into(), true);
        self
    }

    fn push_classified(&mut self, expr: String, is_aggregate: bool) {
        let (mut vanilla, mut aggregate) = match std::mem::take(&mut self.filter_by) {
            FilterBy::Flat(items) => (items, Vec::new()),
            FilterBy::Split { vanilla, aggregate } => (vanilla, aggregate),
        };
        if is_aggregate {
            aggregate.push(expr);
        } else {
            vanilla.push(expr);
        }
        self.filter_by = FilterBy::Split { vanilla, aggregate };
    }

    pub fn order(mut self, entry: impl Into<String>) -> Self {
        self.order_by.push(entry.into());
        self
    }

    pub fn referencing(mut self, model: impl Into<String>) -> Self {
        self.referenced_models.insert(model.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Referenced models other than the base model.
    pub fn joined_models(&self) -> Vec<&str> {
        self.referenced_models
            .iter()
            .map(String::as_str)
            .filter(|m| Some(*m) != self.base_model.as_deref())
            .collect()
    }

    /// Does this query span more than one model?
    pub fn is_multi_model(&self) -> bool {
        !self.joined_models().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cohort_on() {
        assert_eq!(TokenizedTrace::new("SELECT 1").cohort_on, "'values'");
    }

    #[test]
    fn test_multi_model_ignores_base() {
        let trace = TokenizedTrace::new("SELECT 1")
            .with_base_model("orders")
            .referencing("orders");
        assert!(!trace.is_multi_model());
        assert!(trace.referencing("users").is_multi_model());
    }

    #[test]
    fn test_filter_forms() {
        let trace = TokenizedTrace::new("SELECT 1")
            .vanilla_filter("a > 1")
            .aggregate_filter("SUM(b) > 2");
        assert_eq!(
            trace.filter_by,
            FilterBy::Split {
                vanilla: vec!["a > 1".into()],
                aggregate: vec!["SUM(b) > 2".into()],
            }
        );

        let flat = trace.filter("c = 3");
        assert!(matches!(flat.filter_by, FilterBy::Flat(ref items) if items.len() == 3));
    }

    #[test]
    fn test_deserialize_flat_and_split_filters() {
        let flat: TokenizedTrace =
            serde_json::from_str(r#"{"sql": "SELECT 1", "filter_by": ["x > 1"]}"#).unwrap();
        assert_eq!(flat.filter_by, FilterBy::Flat(vec!["x > 1".into()]));
        assert_eq!(flat.cohort_on, DEFAULT_COHORT_ON);

        let split: TokenizedTrace = serde_json::from_str(
            r#"{"sql": "SELECT 1", "filter_by": {"aggregate": ["SUM(x) > 1"]}}"#,
        )
        .unwrap();
        assert_eq!(
            split.filter_by,
            FilterBy::Split {
                vanilla: vec![],
                aggregate: vec!["SUM(x) > 1".into()],
            }
        );
    }
}
