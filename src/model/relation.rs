//! Declared join conditions between two models.

use serde::{Deserialize, Serialize};

use crate::semantic::refs;
use crate::sql::query::JoinType;

/// A join condition between exactly two models.
///
/// The condition is a boolean SQL expression whose model references use
/// `${ref(model).field}` tokens, e.g. `${ref(orders).user_id} = ${ref(users).id}`.
/// The first referenced model is the left side of the join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub condition: String,
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default)]
    pub is_default: bool,
}

impl Relation {
    pub fn new(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
            join_type: JoinType::Inner,
            is_default: false,
        }
    }

    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Referenced entity names in order of first appearance.
    pub fn referenced_models(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for token in refs::tokenize(&self.condition) {
            if !out.contains(&token.entity) {
                out.push(token.entity);
            }
        }
        out
    }

    /// The two joined models, when the condition names exactly two.
    pub fn model_pair(&self) -> Option<(String, String)> {
        let models = self.referenced_models();
        match models.as_slice() {
            [left, right] => Some((left.clone(), right.clone())),
            _ => None,
        }
    }
}
