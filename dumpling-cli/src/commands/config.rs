//! `dumpling config` command - Validate a backup configuration file.

use dumpling_dsn::{BackupConfig, ConfigFile, DatabaseTarget};
use tracing::debug;

use crate::cli::ConfigArgs;
use crate::commands::parse::mask;
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, kv_opt, success, warn};

/// Run the config command
pub async fn run(args: ConfigArgs) -> CliResult<()> {
    let file = match args.file {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration file");
            ConfigFile::open(path)?
        }
        None => ConfigFile::from_env()?,
    };
    let config = file.config();

    if args.json {
        output::json(&masked(config))?;
        return Ok(());
    }

    output::header("Backup Configuration");
    kv("File", &file.path().display().to_string());
    output::newline();

    let mut problems = 0;
    problems += show_target("Source", &config.source);
    problems += show_target("Destination", &config.destination);

    output::section("Upload");
    kv("Bucket", &config.upload.bucket);
    kv("Object", &format!("{}.sql", config.upload.name));
    output::newline();

    output::section("Transformers");
    if config.transformers.is_empty() {
        output::dim("  none");
    }
    for (i, script) in config.transformers.iter().enumerate() {
        output::numbered_item(i + 1, script);
    }
    output::newline();

    output::section("Skipped table data");
    if config.skip.is_empty() {
        output::dim("  none");
    }
    for table in &config.skip {
        output::list_item(table);
    }
    output::newline();

    if problems > 0 {
        return Err(CliError::Config(format!(
            "{} connection string(s) could not be parsed",
            problems
        )));
    }

    if let Err(e) = config.source_database() {
        warn(&e.to_string());
    }
    success("Configuration is valid!");
    Ok(())
}

/// Print a database target; returns 1 when its URI does not parse.
fn show_target(title: &str, target: &DatabaseTarget) -> usize {
    output::section(title);
    let problems = match target.connection() {
        Ok(conn) => {
            kv("URI", &mask(&conn, false));
            kv_opt("Host", conn.host());
            kv_opt("Port", conn.port().map(|p| p.to_string()).as_deref());
            kv("Database", target.name.as_deref().unwrap_or(conn.database()));
            0
        }
        Err(e) => {
            kv("URI", &target.uri);
            warn(&format!("{} uri is not a valid DSN: {}", title, e));
            1
        }
    };
    kv("Version", &target.version.to_string());
    output::newline();
    problems
}

/// A copy of the configuration with passwords masked.
fn masked(config: &BackupConfig) -> BackupConfig {
    let mut config = config.clone();
    for target in [&mut config.source, &mut config.destination] {
        if let Ok(conn) = target.connection() {
            target.uri = mask(&conn, false);
        }
    }
    config
}
