//! CLI parsing tests for batch command.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::Command;
    use clap::Parser;
    use rstest::rstest;

    #[rstest]
    fn test_batch_parses_statement() {
        let args = Args::try_parse_from(["rowrunner", "-o", "json", "batch", "SELECT 1; SELECT 2"]).unwrap();
        assert_eq!(args.format, crate::output::OutputFormat::Json);
        match args.command {
            Command::Batch(cmd) => assert_eq!(cmd.statement.sql, "SELECT 1; SELECT 2"),
            _ => panic!("Expected Batch command"),
        }
    }
}
