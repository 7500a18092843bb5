//! CLI parsing tests for exec command.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::Command;
    use clap::Parser;
    use rowrunner::SqlValue;
    use rstest::rstest;

    #[rstest]
    fn test_exec_requires_sql() {
        let result = Args::try_parse_from(["rowrunner", "exec"]);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("<SQL>"), "Expected missing <SQL> error, got: {}", err);
    }

    #[rstest]
    fn test_exec_with_binds() {
        let args = Args::try_parse_from(["rowrunner", "exec", "DELETE FROM t WHERE a = @a", "-b", "a=1", "--bind", "b=x"])
            .unwrap();
        match args.command {
            Command::Exec(cmd) => {
                assert_eq!(cmd.statement.sql, "DELETE FROM t WHERE a = @a");
                assert_eq!(
                    cmd.statement.binds,
                    vec![("a".to_string(), SqlValue::Int(1)), ("b".to_string(), SqlValue::Str("x".into()))]
                );
            }
            _ => panic!("Expected Exec command"),
        }
    }

    #[rstest]
    fn test_exec_rejects_malformed_bind() {
        assert!(Args::try_parse_from(["rowrunner", "exec", "SELECT 1", "-b", "oops"]).is_err());
    }
}
