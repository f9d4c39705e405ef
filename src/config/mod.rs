//! Configuration module for sqlweave.
//!
//! Handles the TOML settings file and its `[compile]` section.

mod settings;

pub use settings::{CompileSettings, Settings, SettingsError, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
