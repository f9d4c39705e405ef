//! Input accessor checks: `${region.value}`, `${regions.values}`.
//!
//! Single-select inputs are read with `.value`; multi-select inputs with
//! one of `.values`, `.min`, `.max`, `.first` or `.last`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::ValidationResult;
use crate::model::{FilterBy, InputType, Project, TokenizedTrace};

/// `${name}` or `${name.accessor}`, never `${ref(...)}`.
static INPUT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][\w-]*)\s*(?:\.\s*([A-Za-z_]\w*)\s*)?\}").expect("input pattern is valid")
});

/// How an input's value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Value,
    Values,
    Min,
    Max,
    First,
    Last,
}

impl Accessor {
    pub const MULTI: [Accessor; 5] = [
        Accessor::Values,
        Accessor::Min,
        Accessor::Max,
        Accessor::First,
        Accessor::Last,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Accessor::Value => "value",
            Accessor::Values => "values",
            Accessor::Min => "min",
            Accessor::Max => "max",
            Accessor::First => "first",
            Accessor::Last => "last",
        }
    }

    /// Input type this accessor applies to.
    pub fn input_type(&self) -> InputType {
        match self {
            Accessor::Value => InputType::Single,
            _ => InputType::Multi,
        }
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.as_str())
    }
}

impl FromStr for Accessor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(Accessor::Value),
            "values" => Ok(Accessor::Values),
            "min" => Ok(Accessor::Min),
            "max" => Ok(Accessor::Max),
            "first" => Ok(Accessor::First),
            "last" => Ok(Accessor::Last),
            _ => Err(()),
        }
    }
}

fn multi_accessors() -> String {
    Accessor::MULTI.iter().map(Accessor::to_string).collect::<Vec<_>>().join(", ")
}

/// What to write instead, for an input of `input_type`.
fn suggestion(input_type: InputType) -> String {
    match input_type {
        InputType::Single => "did you mean .value?".to_string(),
        InputType::Multi => format!("use one of {}", multi_accessors()),
    }
}

fn describe(input_type: InputType) -> &'static str {
    match input_type {
        InputType::Single => "single-select",
        InputType::Multi => "multi-select",
    }
}

/// Validates input accessors against the inputs a project declares.
#[derive(Debug, Clone, Copy)]
pub struct AccessorValidator<'a> {
    project: &'a Project,
}

impl<'a> AccessorValidator<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self { project }
    }

    /// Check every `${input...}` block in `text`. Reports the first problem.
    pub fn validate(&self, text: &str) -> ValidationResult {
        for caps in INPUT_PATTERN.captures_iter(text) {
            let name = &caps[1];
            let accessor = caps.get(2).map(|m| m.as_str());
            if let Err(message) = self.check(name, accessor) {
                return ValidationResult::fail(message);
            }
        }
        ValidationResult::ok()
    }

    /// Check every expression of a trace: selects, filters and ORDER BY.
    pub fn validate_trace(&self, trace: &TokenizedTrace) -> ValidationResult {
        let filters: Vec<&String> = match &trace.filter_by {
            FilterBy::Flat(items) => items.iter().collect(),
            FilterBy::Split { vanilla, aggregate } => vanilla.iter().chain(aggregate).collect(),
        };
        trace
            .select_items
            .values()
            .chain(filters)
            .chain(&trace.order_by)
            .map(|text| self.validate(text))
            .find(|result| !result.is_valid)
            .unwrap_or_else(ValidationResult::ok)
    }

    fn check(&self, name: &str, accessor: Option<&str>) -> Result<(), String> {
        let Some(input) = self.project.input(name) else {
            return Err(format!("unknown input '{}'", name));
        };
        let input_type = input.input_type;

        let Some(accessor) = accessor else {
            return Err(format!(
                "input '{}' must be read through an accessor: {}",
                name,
                suggestion(input_type)
            ));
        };
        let Ok(parsed) = accessor.parse::<Accessor>() else {
            return Err(format!(
                "unknown accessor '.{}' on {} input '{}': {}",
                accessor,
                describe(input_type),
                name,
                suggestion(input_type)
            ));
        };
        if parsed.input_type() != input_type {
            return Err(format!(
                "'{}' is only valid for {} inputs, and '{}' is {}: {}",
                parsed,
                describe(parsed.input_type()),
                name,
                describe(input_type),
                suggestion(input_type)
            ));
        }
        Ok(())
    }
}
