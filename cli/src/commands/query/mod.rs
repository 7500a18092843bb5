mod execute;

use clap::Args;

use super::StatementArgs;

/// Stream the rows of a query
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  rowrunner query \"SELECT * FROM t\"
  rowrunner query \"SELECT * FROM t WHERE a > @min\" -b min=1 --limit 10 -o json
")]
pub struct QueryCmd {
    #[command(flatten)]
    pub statement: StatementArgs,

    /// Stop after this many rows
    #[arg(short, long)]
    pub limit: Option<usize>,
}
