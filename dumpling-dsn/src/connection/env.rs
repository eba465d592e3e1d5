//! Connection strings held in environment variables.

use super::{ConnectionError, ConnectionResult, ParsedConnection};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Source for environment variables.
pub trait EnvSource: Send + Sync {
    /// Get an environment variable value.
    fn get(&self, name: &str) -> Option<String>;

    /// Check if a variable exists.
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Default environment source using std::env.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Environment source backed by a HashMap.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create a new map-based environment source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Add multiple variables.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars.extend(vars);
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Parse the DSN stored in environment variable `name`.
///
/// ```rust,no_run
/// use dumpling_dsn::connection::parse_environ;
///
/// let conn = parse_environ("DATABASE_URL", [("port", "5432")]).unwrap();
/// println!("{}", conn.hostloc());
/// ```
pub fn parse_environ<I, K, V>(name: &str, defaults: I) -> ConnectionResult<ParsedConnection>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    parse_environ_from(&StdEnvSource, name, defaults)
}

/// [`parse_environ`] against an explicit [`EnvSource`].
pub fn parse_environ_from<S, I, K, V>(
    source: &S,
    name: &str,
    defaults: I,
) -> ConnectionResult<ParsedConnection>
where
    S: EnvSource + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let dsn = source
        .get(name)
        .ok_or_else(|| ConnectionError::EnvNotFound(name.to_string()))?;
    debug!(name = name, "Parsing DSN from environment");
    ParsedConnection::parse_with_defaults(&dsn, defaults)
}

/// Parse `NAME` and the numbered series `NAME_1`, `NAME_2`, ...
///
/// `NAME` is included when set. Numbering starts at `NAME_0` when that is
/// set, otherwise at `NAME_1`, and stops at the first missing number: with
/// `NAME_1` and `NAME_3` set, `NAME_3` is never read.
///
/// Fails with [`ConnectionError::EnvNotFound`] when nothing was found.
pub fn parse_environs<I, K, V>(name: &str, defaults: I) -> ConnectionResult<Vec<ParsedConnection>>
where
    I: IntoIterator<Item = (K, V)> + Clone,
    K: AsRef<str>,
    V: AsRef<str>,
{
    parse_environs_from(&StdEnvSource, name, defaults)
}

/// [`parse_environs`] against an explicit [`EnvSource`].
pub fn parse_environs_from<S, I, K, V>(
    source: &S,
    name: &str,
    defaults: I,
) -> ConnectionResult<Vec<ParsedConnection>>
where
    S: EnvSource + ?Sized,
    I: IntoIterator<Item = (K, V)> + Clone,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut found = Vec::new();

    if source.contains(name) {
        found.push(parse_environ_from(source, name, defaults.clone())?);
    }

    let numbered = |n: usize| format!("{}_{}", name, n);
    let mut n = if source.contains(&numbered(0)) { 0 } else { 1 };
    while let Some(dsn) = source.get(&numbered(n)) {
        debug!(name = %numbered(n), "Parsing numbered DSN from environment");
        found.push(ParsedConnection::parse_with_defaults(&dsn, defaults.clone())?);
        n += 1;
    }

    if found.is_empty() {
        return Err(ConnectionError::EnvNotFound(name.to_string()));
    }
    Ok(found)
}

/// Resolve a `$NAME` or `${NAME}` reference.
///
/// Only values that start with `$` are references. An unset variable leaves
/// the value untouched.
///
/// ```rust
/// use dumpling_dsn::connection::{resolve_reference, MapEnvSource};
///
/// let env = MapEnvSource::new().set("SOURCE_URI", "postgres://db/app");
/// assert_eq!(resolve_reference(&env, "$SOURCE_URI"), "postgres://db/app");
/// assert_eq!(resolve_reference(&env, "${SOURCE_URI}"), "postgres://db/app");
/// assert_eq!(resolve_reference(&env, "postgres://$HOST/app"), "postgres://$HOST/app");
/// ```
pub fn resolve_reference<S: EnvSource + ?Sized>(source: &S, value: &str) -> String {
    let Some(reference) = value.strip_prefix('$') else {
        return value.to_string();
    };
    let name = reference
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(reference);

    match source.get(name) {
        Some(resolved) => resolved,
        None => {
            warn!(name = name, "Environment reference is not set, keeping literal value");
            value.to_string()
        }
    }
}
