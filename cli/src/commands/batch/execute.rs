use std::error::Error;

use rowrunner::{CancellationToken, Execute, Runner};
use serde::Serialize;

use super::BatchCmd;
use crate::commands::rows::{record, RowsResult};
use crate::commands::RunCommand;

/// Result of the batch command
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub sets: Vec<RowsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected: Option<u64>,
}

impl RunCommand for BatchCmd {
    type Output = BatchResult;

    async fn execute(self, runner: &Runner) -> Result<Self::Output, Box<dyn Error>> {
        let query = self.statement.query();
        let mut sets = runner.run_many(&query, &CancellationToken::new()).await?;

        let mut result = BatchResult::default();
        loop {
            let records = sets.all_records(record()).to_vec().await?;
            result.sets.push(RowsResult::from_records(records));
            result.affected = sets.records_affected().or(result.affected);
            if !sets.next_result().await? {
                break;
            }
        }
        sets.dispose().await;
        Ok(result)
    }
}
