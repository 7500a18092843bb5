mod cli_tests;
mod execute;
mod output;

use clap::Args;

use super::StatementArgs;

/// Run a statement for its side effects
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  rowrunner exec \"DELETE FROM t WHERE a > @min\" -b min=3
  rowrunner exec \"CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1), (2)\"
")]
pub struct ExecCmd {
    #[command(flatten)]
    pub statement: StatementArgs,
}
