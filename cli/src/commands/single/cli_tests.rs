//! CLI parsing tests for single command.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::Command;
    use clap::Parser;
    use rowrunner::SqlValue;
    use rstest::rstest;

    #[rstest]
    fn test_single_with_typed_binds() {
        let args = Args::try_parse_from([
            "rowrunner", "single", "SELECT @x, @y", "-b", "x=1.5", "-b", "y=null",
        ])
        .unwrap();
        match args.command {
            Command::Single(cmd) => {
                let query = cmd.statement.query();
                assert_eq!(query.bindings().get("x"), Some(&SqlValue::Float(1.5)));
                assert_eq!(query.bindings().get("y"), Some(&SqlValue::Null));
            }
            _ => panic!("Expected Single command"),
        }
    }
}
