//! Canonical column types.
//!
//! Dimension `data_type` fields are free text in project files. They are
//! mapped onto a small set of SQL types for the schema handed to the
//! qualification pass.

use serde::{Deserialize, Serialize};

/// Canonical SQL type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Varchar,
    Integer,
    BigInt,
    Float,
    Double,
    /// DECIMAL/NUMERIC, kept with the precision the user wrote.
    Decimal(String),
    Date,
    Timestamp,
    Boolean,
}

impl DataType {
    /// Map a user-facing type name to its canonical type.
    ///
    /// Unknown names map to `VARCHAR`.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "string" | "text" | "varchar" => DataType::Varchar,
            "integer" | "int" => DataType::Integer,
            "bigint" => DataType::BigInt,
            "float" => DataType::Float,
            "double" => DataType::Double,
            "date" => DataType::Date,
            "datetime" | "timestamp" => DataType::Timestamp,
            "boolean" | "bool" => DataType::Boolean,
            _ if lower.starts_with("decimal") || lower.starts_with("numeric") => {
                DataType::Decimal(trimmed.to_uppercase())
            }
            _ => DataType::Varchar,
        }
    }

    /// SQL spelling of the type.
    pub fn as_sql(&self) -> &str {
        match self {
            DataType::Varchar => "VARCHAR",
            DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Decimal(spelling) => spelling,
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Boolean => "BOOLEAN",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}
