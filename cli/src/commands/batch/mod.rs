mod cli_tests;
mod execute;
mod execute_tests;
mod output;

use clap::Args;

use super::StatementArgs;

/// Run several statements and print each result set in turn
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  rowrunner batch \"SELECT a FROM t; SELECT a * 3 FROM t\"
  rowrunner batch \"UPDATE t SET c = 0; SELECT * FROM t\" -o json
")]
pub struct BatchCmd {
    #[command(flatten)]
    pub statement: StatementArgs,
}
