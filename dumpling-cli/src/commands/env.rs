//! `dumpling env` command - Parse DSNs stored in environment variables.

use dumpling_dsn::{parse_environ, parse_environs};
use tracing::debug;

use crate::cli::EnvArgs;
use crate::commands::parse::{describe, to_json};
use crate::error::CliResult;
use crate::output;

/// Run the env command
pub async fn run(args: EnvArgs) -> CliResult<()> {
    let defaults = args.defaults.iter().map(|(k, v)| (k, v));
    let conns = if args.all {
        parse_environs(&args.name, defaults)?
    } else {
        vec![parse_environ(&args.name, defaults)?]
    };
    debug!(name = %args.name, found = conns.len(), "Resolved environment DSNs");

    if args.json {
        let values = conns
            .iter()
            .map(|conn| to_json(conn, args.reveal))
            .collect::<CliResult<Vec<_>>>()?;
        output::json(&values)?;
        return Ok(());
    }

    output::header(&format!("Environment: {}", args.name));
    for (i, conn) in conns.iter().enumerate() {
        if i > 0 {
            output::newline();
        }
        if args.all {
            output::section(&format!("Connection {}", i + 1));
        }
        describe(conn, args.reveal);
    }

    if args.all {
        output::newline();
        output::success(&format!("Found {} connection string(s)", conns.len()));
        output::dim(&format!(
            "Numbered variables are read until the first gap ({}_N missing).",
            args.name
        ));
    }

    Ok(())
}
