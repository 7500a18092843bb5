use std::error::Error;

use rowrunner::{CancellationToken, Execute, Runner};
use serde::Serialize;

use super::ExecCmd;
use crate::commands::RunCommand;

/// Result of the exec command
#[derive(Debug, Serialize)]
pub struct ExecResult {
    pub statement: String,
    pub affected: u64,
}

impl RunCommand for ExecCmd {
    type Output = ExecResult;

    async fn execute(self, runner: &Runner) -> Result<Self::Output, Box<dyn Error>> {
        let query = self.statement.query();
        let affected = runner.run_no_result(&query, &CancellationToken::new()).await?;
        Ok(ExecResult {
            statement: self.statement.sql,
            affected,
        })
    }
}
