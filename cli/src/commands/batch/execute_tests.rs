//! Execute tests for batch command.

#[cfg(test)]
mod tests {
    use super::super::BatchCmd;
    use crate::commands::rows::RowsResult;
    use crate::commands::RunCommand;
    use crate::commands::StatementArgs;
    use rowrunner::test_utils::{exec, seeded_runner};
    use rowrunner::SqlValue;
    use rstest::rstest;

    fn cmd(sql: &str) -> BatchCmd {
        BatchCmd {
            statement: StatementArgs {
                sql: sql.to_string(),
                binds: Vec::new(),
            },
        }
    }

    fn column(set: &RowsResult) -> Vec<i64> {
        set.rows
            .iter()
            .map(|row| match row[0] {
                SqlValue::Int(v) => v,
                ref other => panic!("expected an integer, got {:?}", other),
            })
            .collect()
    }

    #[rstest]
    #[tokio::test]
    async fn test_batch_reads_every_result_set() {
        let (runner, tracker, _dir) = seeded_runner().await;

        let result = cmd("SELECT a FROM t ORDER BY a; SELECT a * 3 FROM t ORDER BY a")
            .execute(&runner)
            .await
            .unwrap();
        assert_eq!(result.sets.len(), 2);
        assert_eq!(column(&result.sets[0]), vec![1, 2, 5]);
        assert_eq!(column(&result.sets[1]).iter().sum::<i64>(), 24);
        tracker.assert_all_released();
    }

    #[rstest]
    #[tokio::test]
    async fn test_batch_counts_changes_before_select() {
        let (runner, tracker, _dir) = seeded_runner().await;
        exec(&runner, "CREATE TABLE log (msg TEXT)").await;

        let result = cmd("INSERT INTO log VALUES ('a'), ('b'); SELECT count(*) AS n FROM log")
            .execute(&runner)
            .await
            .unwrap();
        assert_eq!(result.sets.len(), 1);
        assert_eq!(column(&result.sets[0]), vec![2]);
        assert_eq!(result.affected, Some(2));
        tracker.assert_all_released();
    }
}
