use std::error::Error;

use rowrunner::{CancellationToken, Execute, Runner};

use super::SingleCmd;
use crate::commands::rows::{record, RowsResult};
use crate::commands::RunCommand;

impl RunCommand for SingleCmd {
    type Output = RowsResult;

    async fn execute(self, runner: &Runner) -> Result<Self::Output, Box<dyn Error>> {
        let query = self.statement.query();
        let row = runner.run_single(&query, record(), &CancellationToken::new()).await?;
        Ok(RowsResult::from_records(vec![row]))
    }
}
