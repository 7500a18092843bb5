use std::error::Error;

use rowrunner::{CancellationToken, Execute, Runner};

use super::QueryCmd;
use crate::commands::rows::{record, RowsResult};
use crate::commands::RunCommand;

impl RunCommand for QueryCmd {
    type Output = RowsResult;

    async fn execute(self, runner: &Runner) -> Result<Self::Output, Box<dyn Error>> {
        let query = self.statement.query();
        let mut rows = runner.run(&query, record(), &CancellationToken::new()).await?;

        let mut records = Vec::new();
        while self.limit.is_none_or(|limit| records.len() < limit) {
            match rows.try_next().await? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        rows.dispose().await;

        tracing::debug!(rows = records.len(), "Query complete");
        Ok(RowsResult::from_records(records))
    }
}
