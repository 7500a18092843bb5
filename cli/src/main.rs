use clap::Parser;

mod cli;
mod commands;
pub mod output;
use cli::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = cli::resolve_config(args.config.as_deref(), args.db.as_deref())?;
    rowrunner::logging::init_with_level(&config.log_level);
    tracing::debug!(database = ?config.database, "Configuration resolved");

    let runner = config.runner();
    let output = args.command.run(&runner, args.format).await?;
    println!("{}", output);
    Ok(())
}
