//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `execute` implementation producing a serializable result
//! - An `Outputable` implementation for table rendering

mod batch;
mod exec;
mod query;
mod rows;
mod single;

pub use batch::BatchCmd;
pub use exec::ExecCmd;
pub use query::QueryCmd;
pub use single::SingleCmd;

use std::error::Error;

use clap::{Args, Subcommand};
use rowrunner::{Query, Runner, SqlValue};

use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait RunCommand {
    type Output: Outputable;

    async fn execute(self, runner: &Runner) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a statement for its side effects and print the affected row count
    Exec(ExecCmd),

    /// Stream the rows of a query
    Query(QueryCmd),

    /// Read exactly one row
    Single(SingleCmd),

    /// Run a multi-statement batch and print every result set
    Batch(BatchCmd),
}

impl Command {
    /// Execute the command and return formatted output
    pub async fn run(self, runner: &Runner, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Exec(cmd) => Ok(cmd.execute(runner).await?.format(format)),
            Command::Query(cmd) => Ok(cmd.execute(runner).await?.format(format)),
            Command::Single(cmd) => Ok(cmd.execute(runner).await?.format(format)),
            Command::Batch(cmd) => Ok(cmd.execute(runner).await?.format(format)),
        }
    }
}

/// Statement and bind variables shared by every command.
#[derive(Args, Debug, Clone)]
pub struct StatementArgs {
    /// SQL text; may hold several statements separated by `;`
    pub sql: String,

    /// Bind variable as NAME=VALUE (repeatable); referenced as @NAME, :NAME or $NAME
    #[arg(short, long = "bind", value_name = "NAME=VALUE", value_parser = parse_binding)]
    pub binds: Vec<(String, SqlValue)>,
}

impl StatementArgs {
    pub fn query(&self) -> Query {
        self.binds
            .iter()
            .fold(Query::plain(self.sql.as_str()), |q, (name, value)| q.bind(name.as_str(), value.clone()))
    }
}

/// Parses `NAME=VALUE`, typing the value as integer, real, boolean, null or text.
pub fn parse_binding(raw: &str) -> Result<(String, SqlValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    if name.is_empty() {
        return Err(format!("missing bind name in '{}'", raw));
    }
    Ok((name.to_string(), parse_value(value)))
}

fn parse_value(value: &str) -> SqlValue {
    if let Ok(i) = value.parse::<i64>() {
        return SqlValue::Int(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return SqlValue::Float(f);
    }
    match value {
        "true" => SqlValue::Bool(true),
        "false" => SqlValue::Bool(false),
        "null" => SqlValue::Null,
        _ => SqlValue::Str(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("id=7", "id", SqlValue::Int(7))]
    #[case("ratio=0.25", "ratio", SqlValue::Float(0.25))]
    #[case("flag=true", "flag", SqlValue::Bool(true))]
    #[case("flag=false", "flag", SqlValue::Bool(false))]
    #[case("gone=null", "gone", SqlValue::Null)]
    #[case("name=Ada", "name", SqlValue::Str("Ada".into()))]
    #[case("expr=a=b", "expr", SqlValue::Str("a=b".into()))]
    #[case("empty=", "empty", SqlValue::Str(String::new()))]
    fn test_parse_binding(#[case] raw: &str, #[case] name: &str, #[case] value: SqlValue) {
        assert_eq!(parse_binding(raw).unwrap(), (name.to_string(), value));
    }

    #[rstest]
    #[case("novalue")]
    #[case("=5")]
    fn test_parse_binding_rejects(#[case] raw: &str) {
        assert!(parse_binding(raw).is_err());
    }

    #[rstest]
    fn test_statement_args_bind_all() {
        let args = StatementArgs {
            sql: "SELECT @a, @b".to_string(),
            binds: vec![("a".into(), SqlValue::Int(1)), ("b".into(), SqlValue::Null)],
        };
        let query = args.query();
        assert_eq!(query.statement(), "SELECT @a, @b");
        assert_eq!(query.bindings().len(), 2);
        assert_eq!(query.bindings().get("b"), Some(&SqlValue::Null));
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_formats_command_output() {
        use clap::Parser;
        let (runner, tracker, _dir) = rowrunner::test_utils::seeded_runner().await;

        let args = crate::cli::Args::try_parse_from([
            "rowrunner", "-o", "json", "single", "SELECT max(a) AS top FROM t",
        ])
        .unwrap();
        let output = args.command.run(&runner, args.format).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["columns"][0], "top");
        assert_eq!(json["rows"][0][0], 5);
        tracker.assert_all_released();
    }
}
