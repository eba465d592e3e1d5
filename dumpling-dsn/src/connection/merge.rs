//! Field precedence between the URL, caller defaults and the query string.
//!
//! Merging runs three ordered passes over one field map:
//!
//! 1. [`FieldMerge::seed`] records what the URL itself supplied.
//! 2. [`FieldMerge::apply_defaults`] fills fields the URL left empty.
//! 3. [`FieldMerge::fold_query`] moves query entries that name a field into
//!    that field, rejecting any that would overwrite a non-empty value.

use super::query::{QueryMap, QueryValue};
use super::{ConnectionError, ConnectionResult};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// A named field of a parsed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// The URL scheme.
    Scheme,
    /// The login name.
    Username,
    /// The login password.
    Password,
    /// The host name.
    Hostname,
    /// The TCP port.
    Port,
    /// The path, which carries the database name.
    Path,
    /// The `;params` segment.
    Params,
    /// The `#fragment` segment.
    Fragment,
}

impl Field {
    /// Every field, in URL order.
    pub const ALL: [Field; 8] = [
        Field::Scheme,
        Field::Username,
        Field::Password,
        Field::Hostname,
        Field::Port,
        Field::Path,
        Field::Params,
        Field::Fragment,
    ];

    /// The canonical field name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scheme => "scheme",
            Self::Username => "username",
            Self::Password => "password",
            Self::Hostname => "hostname",
            Self::Port => "port",
            Self::Path => "path",
            Self::Params => "params",
            Self::Fragment => "fragment",
        }
    }

    /// Resolve a query string key to the field it overrides.
    ///
    /// Only canonical names and `host` qualify. Other aliases such as `user`
    /// or `dbname` are ordinary driver options when they appear in a query.
    pub fn from_query_key(key: &str) -> Option<Self> {
        match key {
            "host" => Some(Self::Hostname),
            _ => Self::ALL.into_iter().find(|field| field.name() == key),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ConnectionError;

    /// Accepts canonical names and the accessor aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheme" => Ok(Self::Scheme),
            "username" | "user" => Ok(Self::Username),
            "password" | "secret" => Ok(Self::Password),
            "hostname" | "host" => Ok(Self::Hostname),
            "port" => Ok(Self::Port),
            "path" | "database" | "dbname" => Ok(Self::Path),
            "params" => Ok(Self::Params),
            "fragment" | "anchor" => Ok(Self::Fragment),
            other => Err(ConnectionError::UnknownField(other.to_string())),
        }
    }
}

/// The working field map of a connection being merged.
///
/// An empty string means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FieldMerge {
    values: [String; 8],
}

impl FieldMerge {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a value supplied by the URL itself.
    pub(crate) fn seed(&mut self, field: Field, value: Option<String>) {
        self.values[field.index()] = value.unwrap_or_default();
    }

    /// Current value of a field, if non-empty.
    pub(crate) fn get(&self, field: Field) -> Option<&str> {
        let value = self.values[field.index()].as_str();
        (!value.is_empty()).then_some(value)
    }

    /// Take a field out of the map, leaving it empty.
    pub(crate) fn take(&mut self, field: Field) -> Option<String> {
        let value = std::mem::take(&mut self.values[field.index()]);
        (!value.is_empty()).then_some(value)
    }

    /// Fill empty fields from caller defaults.
    ///
    /// Keys that do not name a field are treated as option defaults and
    /// added to `query` when the query string did not set them.
    pub(crate) fn apply_defaults<I, K, V>(&mut self, defaults: I, query: &mut QueryMap)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in defaults {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key.parse::<Field>() {
                Ok(field) => {
                    if self.get(field).is_none() {
                        trace!(field = %field, "Applying default");
                        self.values[field.index()] = value.to_string();
                    }
                }
                Err(_) => {
                    if !query.contains_key(key) {
                        query.insert(key.to_string(), QueryValue::from(value));
                    }
                }
            }
        }
    }

    /// Move query entries that name a field into the field map.
    ///
    /// Fails when the field already holds a value, or when the key was
    /// repeated in the query string.
    pub(crate) fn fold_query(&mut self, query: &mut QueryMap) -> ConnectionResult<()> {
        let claimed: Vec<(String, Field)> = query
            .keys()
            .filter_map(|key| Field::from_query_key(key).map(|field| (key.clone(), field)))
            .collect();

        for (key, field) in claimed {
            if self.get(field).is_some() {
                return Err(ConnectionError::Conflict { field: key });
            }

            match query.shift_remove(&key) {
                Some(QueryValue::Single(value)) => {
                    trace!(field = %field, "Taking field from query string");
                    self.values[field.index()] = value;
                }
                Some(QueryValue::Multi(_)) => return Err(ConnectionError::Conflict { field: key }),
                None => {}
            }
        }

        Ok(())
    }
}
