//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Dumpling CLI - database backup connection tooling
#[derive(Parser, Debug)]
#[command(name = "dumpling")]
#[command(version)]
#[command(about = "Dumpling CLI - inspect DSNs and backup configuration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a connection string and show its fields
    Parse(ParseArgs),

    /// Parse connection strings stored in environment variables
    Env(EnvArgs),

    /// Validate a backup configuration file
    Config(ConfigArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Parse Command
// =============================================================================

/// Arguments for the `parse` command
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Connection string to parse
    pub dsn: String,

    /// Default for a field the DSN leaves empty (key=value, repeatable)
    #[arg(short = 'd', long = "default", value_parser = parse_key_value)]
    pub defaults: Vec<(String, String)>,

    /// Print the parsed connection as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the password instead of masking it
    #[arg(long)]
    pub reveal: bool,
}

// =============================================================================
// Env Command
// =============================================================================

/// Arguments for the `env` command
#[derive(Args, Debug)]
pub struct EnvArgs {
    /// Environment variable holding the DSN
    pub name: String,

    /// Also read NAME_1, NAME_2, ... until the first missing number
    #[arg(short, long)]
    pub all: bool,

    /// Default for a field the DSN leaves empty (key=value, repeatable)
    #[arg(short = 'd', long = "default", value_parser = parse_key_value)]
    pub defaults: Vec<(String, String)>,

    /// Print the parsed connections as JSON
    #[arg(long)]
    pub json: bool,

    /// Show passwords instead of masking them
    #[arg(long)]
    pub reveal: bool,
}

// =============================================================================
// Config Command
// =============================================================================

/// Arguments for the `config` command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the backup configuration file
    #[arg(short, long, env = "CONFIG_FILE")]
    pub file: Option<PathBuf>,

    /// Print the resolved configuration as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a `key=value` argument.
fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("port=5432").unwrap(),
            ("port".to_string(), "5432".to_string())
        );
        assert_eq!(
            parse_key_value("options=a=b").unwrap(),
            ("options".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("port").is_err());
        assert!(parse_key_value("=5432").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
