//! Configuration file handling for runners.
//!
//! This module provides loading and parsing of `.rowrunner.json` configuration files
//! and turns them into a ready-to-use [`Runner`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::IsolationLevel;
use crate::error::{DbError, DbResult};
#[cfg(feature = "backend-sqlite")]
use crate::runner::Runner;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".rowrunner.json";

/// Top-level configuration file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Milliseconds SQLite waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Isolation level for transactions that do not name one.
    #[serde(default)]
    pub default_isolation: Option<IsolationLevel>,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Database backends, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// SQLite database file
    Sqlite { path: PathBuf },
    /// Private in-memory database per connection
    Memory,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RunnerConfig {
    /// Config for a SQLite file with every other setting at its default.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::with_database(DatabaseConfig::Sqlite { path: path.into() })
    }

    /// Config for a private in-memory database.
    pub fn memory() -> Self {
        Self::with_database(DatabaseConfig::Memory)
    }

    fn with_database(database: DatabaseConfig) -> Self {
        Self {
            database,
            busy_timeout_ms: default_busy_timeout_ms(),
            default_isolation: None,
            log_level: default_log_level(),
        }
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the file is missing, unreadable or not
    /// valid configuration JSON.
    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DbError::Config {
                message: format!(
                    "Configuration file not found: {}\n\n\
                     Example:\n\
                     {{\n  \
                       \"database\": {{ \"type\": \"sqlite\", \"path\": \"./data.sqlite\" }},\n  \
                       \"busy_timeout_ms\": 5000\n\
                     }}",
                    path.display()
                ),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| DbError::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&content)
    }

    /// Loads `.rowrunner.json` from the current directory.
    pub fn load_default() -> DbResult<Self> {
        Self::load(CONFIG_FILE_NAME)
    }

    pub fn from_json(content: &str) -> DbResult<Self> {
        serde_json::from_str(content).map_err(|e| DbError::Config {
            message: format!("Invalid JSON in configuration: {}", e),
        })
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Builds the runner this configuration describes.
    #[cfg(feature = "backend-sqlite")]
    pub fn runner(&self) -> Runner {
        use crate::backend::sqlite::{memory_runner, sqlite_runner_with_timeout};

        let runner = match &self.database {
            DatabaseConfig::Sqlite { path } => sqlite_runner_with_timeout(path, self.busy_timeout()),
            DatabaseConfig::Memory => memory_runner(),
        };
        runner.with_default_isolation(self.default_isolation)
    }
}
