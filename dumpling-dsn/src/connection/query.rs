//! Query string options.

use indexmap::IndexMap;
use serde::Serialize;

/// Options parsed from a DSN query string, in order of first appearance.
pub type QueryMap = IndexMap<String, QueryValue>;

/// The value of a query string option.
///
/// A key that appears once keeps a scalar; a repeated key keeps every value
/// in the order they appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// The key appeared once.
    Single(String),
    /// The key appeared more than once.
    Multi(Vec<String>),
}

impl QueryValue {
    /// The first value given for the key.
    pub fn first(&self) -> &str {
        match self {
            Self::Single(value) => value,
            Self::Multi(values) => values.first().map_or("", String::as_str),
        }
    }

    /// Every value given for the key.
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multi(values) => values,
        }
    }

    /// The value when the key appeared exactly once.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multi(_) => None,
        }
    }

    /// Whether the key was repeated.
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multi(vec![first, value]);
            }
            Self::Multi(values) => values.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            Self::Single(values.remove(0))
        } else {
            Self::Multi(values)
        }
    }
}

/// Parse a raw query string into options.
///
/// Uses `application/x-www-form-urlencoded` rules: pairs are separated by
/// `&`, `+` decodes to a space and a key without `=` gets an empty value.
///
/// ```rust
/// use dumpling_dsn::connection::{parse_query, QueryValue};
///
/// let query = parse_query("sslmode=require&k=1&k=2");
/// assert_eq!(query["sslmode"], QueryValue::Single("require".into()));
/// assert_eq!(query["k"].values(), ["1", "2"]);
/// ```
pub fn parse_query(raw: &str) -> QueryMap {
    let mut options = QueryMap::new();
    if raw.is_empty() {
        return options;
    }

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match options.get_mut(&*key) {
            Some(existing) => existing.push(value.into_owned()),
            None => {
                options.insert(key.into_owned(), QueryValue::Single(value.into_owned()));
            }
        }
    }

    options
}

/// Encode options back into a query string.
pub(crate) fn encode_query(options: &QueryMap) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in options {
        for item in value.values() {
            serializer.append_pair(key, item);
        }
    }
    serializer.finish()
}
