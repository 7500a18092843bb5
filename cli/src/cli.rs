//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared types.
//! Individual command definitions are in the `commands` module.

use clap::Parser;
use std::path::{Path, PathBuf};

use rowrunner::{DatabaseConfig, DbResult, RunnerConfig, CONFIG_FILE_NAME};

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a `.rowrunner.json` configuration file
    ///
    /// If neither --config nor --db is given, searches for configuration in:
    ///   1. ./.rowrunner.json (current directory)
    ///   2. ~/.rowrunner.json (user-global)
    ///
    /// and falls back to a private in-memory database.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a SQLite database file; overrides the configured database
    ///
    /// `:memory:` selects a private in-memory database.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Resolve the runner configuration from the arguments and well-known locations
pub fn resolve_config(config: Option<&Path>, db: Option<&Path>) -> DbResult<RunnerConfig> {
    let mut resolved = match config {
        Some(path) => RunnerConfig::load(path)?,
        None => match discover_config_file() {
            Some(path) => RunnerConfig::load(path)?,
            None => RunnerConfig::memory(),
        },
    };

    if let Some(path) = db {
        resolved.database = if path == Path::new(":memory:") {
            DatabaseConfig::Memory
        } else {
            DatabaseConfig::Sqlite {
                path: path.to_path_buf(),
            }
        };
    }
    Ok(resolved)
}

/// Returns the first configuration file found in the current or home directory
fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    let global = home::home_dir()?.join(CONFIG_FILE_NAME);
    global.exists().then_some(global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    fn test_defaults() {
        let args = Args::try_parse_from(["rowrunner", "single", "SELECT 1"]).unwrap();
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.config.is_none());
        assert!(args.db.is_none());
    }

    #[rstest]
    #[case("table", OutputFormat::Table)]
    #[case("json", OutputFormat::Json)]
    #[case("toon", OutputFormat::Toon)]
    fn test_global_format_after_subcommand(#[case] name: &str, #[case] expected: OutputFormat) {
        let args = Args::try_parse_from(["rowrunner", "query", "SELECT 1", "-o", name]).unwrap();
        assert_eq!(args.format, expected);
    }

    #[rstest]
    fn test_unknown_command_is_rejected() {
        assert!(Args::try_parse_from(["rowrunner", "drop-everything"]).is_err());
    }

    #[rstest]
    fn test_db_flag_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "database": { "type": "memory" }, "log_level": "debug" }"#)
            .unwrap();

        let config = resolve_config(Some(file.path()), Some(Path::new("data.db"))).unwrap();
        assert_eq!(
            config.database,
            DatabaseConfig::Sqlite {
                path: PathBuf::from("data.db")
            }
        );
        assert_eq!(config.log_level, "debug");
    }

    #[rstest]
    fn test_memory_db_flag() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "database": { "type": "sqlite", "path": "x.db" } }"#)
            .unwrap();

        let config = resolve_config(Some(file.path()), Some(Path::new(":memory:"))).unwrap();
        assert_eq!(config.database, DatabaseConfig::Memory);
    }

    #[rstest]
    fn test_missing_config_file_is_an_error() {
        assert!(resolve_config(Some(Path::new("/nonexistent/.rowrunner.json")), None).is_err());
    }
}
