//! TOML-based configuration for sqlweave.
//!
//! Example configuration:
//! ```toml
//! [compile]
//! dialect = "snowflake"
//! cte_suffix = "_cte"
//! alias_separator = "|"
//! qualify = true
//! pretty = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::semantic::sanitize::CTE_SUFFIX;
use crate::sql::Dialect;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "SQLWEAVE_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "sqlweave.toml";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Unknown SQL dialect: '{0}'")]
    UnknownDialect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Query compilation.
    pub compile: CompileSettings,
}

/// `[compile]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Target dialect name, e.g. "duckdb" or "postgresql".
    pub dialect: String,

    /// Alias suffix for per-model CTEs.
    pub cte_suffix: String,

    /// Replacement for '.' in SELECT aliases.
    pub alias_separator: String,

    /// Run the schema-aware qualification pass.
    pub qualify: bool,

    /// Newline/indent formatting of the generated SQL.
    pub pretty: bool,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default().to_string(),
            cte_suffix: CTE_SUFFIX.to_string(),
            alias_separator: "|".to_string(),
            qualify: true,
            pretty: true,
        }
    }
}

impl CompileSettings {
    /// Parsed target dialect.
    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        Dialect::from_str(&self.dialect).map_err(|_| SettingsError::UnknownDialect(self.dialect.clone()))
    }

    fn check(&self) -> Result<(), SettingsError> {
        self.dialect()?;
        if self.alias_separator.contains('.') {
            return Err(SettingsError::InvalidConfig(
                "alias_separator must not contain '.'".into(),
            ));
        }
        if self.cte_suffix.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
            return Err(SettingsError::InvalidConfig(format!(
                "cte_suffix '{}' is not a legal identifier suffix",
                self.cte_suffix
            )));
        }
        Ok(())
    }
}

impl FromStr for Settings {
    type Err = SettingsError;

    /// Parse and check settings from TOML text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let settings: Settings = toml::from_str(s)?;
        settings.compile.check()?;
        Ok(settings)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SQLWEAVE_CONFIG`
    /// 2. `./sqlweave.toml`
    ///
    /// Defaults are returned when neither exists.
    pub fn discover() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::load(&path);
        }

        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Self::load(&local_config);
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Settings::default())
    }
}
