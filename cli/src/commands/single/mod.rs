mod cli_tests;
mod execute;

use clap::Args;

use super::StatementArgs;

/// Read exactly one row; zero or several rows is an error
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  rowrunner single \"SELECT count(*) FROM t\"
  rowrunner single \"SELECT * FROM t WHERE a = @a\" -b a=5 -o toon
")]
pub struct SingleCmd {
    #[command(flatten)]
    pub statement: StatementArgs,
}
