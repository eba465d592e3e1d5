//! Dumpling CLI - inspect connection strings and backup configuration.

use clap::Parser;

use dumpling_cli::cli::{Cli, Command};
use dumpling_cli::commands;
use dumpling_cli::error::CliResult;
use dumpling_cli::output;

#[tokio::main]
async fn main() {
    dumpling_dsn::logging::init();

    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse(args) => commands::parse::run(args).await,
        Command::Env(args) => commands::env::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
        Command::Version => commands::version::run().await,
    }
}
