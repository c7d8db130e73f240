use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bracket_core::db::DbConfig;
use serde::Deserialize;

/// Settings file read from the working directory when `--settings` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "brackets.toml";

pub const DEFAULT_BACKEND: &str = "sqlite";
pub const DEFAULT_CONNECTION_STRING: &str = "brackets.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of a `brackets.toml` file. Every key is optional.
///
/// ```toml
/// [database]
/// backend = "sqlite"
/// connection_string = "brackets.db"
///
/// [logging]
/// level = "debug"
/// file = "brackets.log"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    pub backend: Option<String>,
    pub connection_string: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Bare level or full `EnvFilter` directive.
    pub level: Option<String>,
    /// Append log records to this file as well as stderr.
    pub file: Option<PathBuf>,
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse settings")
    }

    /// Reads `path`, or [`DEFAULT_SETTINGS_FILE`] when it exists, or falls back
    /// to defaults. An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file '{}'", path.display()))?;
        let mut settings = Self::parse(&content)
            .with_context(|| format!("Invalid settings file '{}'", path.display()))?;
        settings.source = Some(path);
        Ok(settings)
    }

    /// Database selection with command-line values taking precedence.
    pub fn db_config(
        &self,
        backend: Option<String>,
        connection_string: Option<String>,
    ) -> DbConfig {
        DbConfig {
            backend: backend
                .or_else(|| self.database.backend.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            connection_string: connection_string
                .or_else(|| self.database.connection_string.clone())
                .unwrap_or_else(|| DEFAULT_CONNECTION_STRING.to_string()),
        }
    }

    pub fn log_level(
        &self,
        level: Option<String>,
    ) -> String {
        level
            .or_else(|| self.logging.level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn log_file(
        &self,
        file: Option<PathBuf>,
    ) -> Option<PathBuf> {
        file.or_else(|| self.logging.file.clone())
    }
}
