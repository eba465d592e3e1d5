//! Logging setup.
//!
//! Library code logs through the standard `tracing` macros and stays silent
//! until a subscriber is installed. Binaries call [`init`] once at startup
//! (requires the `tracing-subscriber` feature).
//!
//! # Environment Variables
//!
//! - `DUMPLING_DEBUG=true|1|yes` - Enable debug logging
//! - `DUMPLING_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `DUMPLING_LOG_FORMAT=json|pretty|compact` - Output format (default: pretty)

use crate::connection::{EnvSource, StdEnvSource};
use std::sync::Once;

static INIT: Once = Once::new();

/// Enables debug logging.
pub const DEBUG_ENV: &str = "DUMPLING_DEBUG";
/// Overrides the log level.
pub const LEVEL_ENV: &str = "DUMPLING_LOG_LEVEL";
/// Selects the output format.
pub const FORMAT_ENV: &str = "DUMPLING_LOG_FORMAT";

/// Output format of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human oriented.
    #[default]
    Pretty,
    /// Single-line.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Logging settings read from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    /// Level filter applied to the dumpling crates.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
    /// Whether logging was asked for at all.
    pub enabled: bool,
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_source(&StdEnvSource)
    }

    /// Read settings from `env`.
    ///
    /// Defaults to `debug` when `DUMPLING_DEBUG` is on, otherwise `warn`.
    pub fn from_source<S: EnvSource + ?Sized>(env: &S) -> Self {
        let debug = env
            .get(DEBUG_ENV)
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));
        let fallback = if debug { "debug" } else { "warn" };

        let requested = env.get(LEVEL_ENV);
        let level = match requested.as_deref().map(str::to_lowercase).as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => fallback,
        };

        let format = match env.get(FORMAT_ENV).map(|f| f.to_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };

        Self {
            level,
            format,
            enabled: debug || requested.is_some(),
        }
    }

    /// The `EnvFilter` directive for these settings.
    pub fn directive(&self) -> String {
        format!(
            "dumpling={},dumpling_dsn={},dumpling_cli={}",
            self.level, self.level, self.level
        )
    }
}

/// Initialize logging from the environment.
///
/// Does nothing unless `DUMPLING_DEBUG` or `DUMPLING_LOG_LEVEL` is set.
/// Subsequent calls are no-ops.
pub fn init() {
    let settings = LogSettings::from_env();
    if settings.enabled {
        install(settings);
    }
}

fn install(settings: LogSettings) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter =
                EnvFilter::try_new(settings.directive()).unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);

            // stdout is reserved for command output.
            let installed = match settings.format {
                LogFormat::Json => registry
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .try_init(),
                LogFormat::Compact => registry
                    .with(fmt::layer().compact().with_writer(std::io::stderr))
                    .try_init(),
                LogFormat::Pretty => registry
                    .with(fmt::layer().pretty().with_writer(std::io::stderr))
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = settings.level, format = ?settings.format, "Logging initialized");
            }
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        {
            let _ = settings;
        }
    });
}
