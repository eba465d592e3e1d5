//! Connection string parser.

use super::merge::{Field, FieldMerge};
use super::query::{QueryMap, QueryValue, encode_query, parse_query};
use super::{ConnectionError, ConnectionResult};
use regex_lite::Regex;
use serde::Serialize;
use std::fmt::{self, Write};
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

/// Path token SQLite uses for a database that only lives in memory.
pub const MEMORY_SENTINEL: &str = ":memory:";

/// Minimal DSN shape: a scheme token, `://`, and something after it.
static DSN_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+://\S+").expect("DSN shape pattern is valid"));

/// `//user:password@` at the start of the remainder.
///
/// The password runs to the last `@` before any query or fragment, so
/// passwords containing `/`, `@`, `:` or `+` survive unescaped. The price is
/// that `host:port/path@x` without credentials is mis-read as credentials.
static LENIENT_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^//([^:]*):([^?#]*)@").expect("credentials pattern is valid")
});

/// Fallback for passwords holding `?` or `#`: the password runs to the first
/// `@`. Only tried when the text after the colon does not start like a port.
static CREDENTIALS_TO_FIRST_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^//([^:]*):([^@]*)@").expect("credentials pattern is valid")
});

/// A parsed DSN.
///
/// Construct with [`ParsedConnection::parse`] or [`parse`]. Aliased accessors
/// (`host`, `user`, `secret`, `dbname`, `anchor`) read the same underlying
/// field as their canonical counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedConnection {
    scheme: String,
    username: Option<String>,
    password: Option<String>,
    hostname: Option<String>,
    port: Option<u16>,
    path: String,
    params: String,
    query: QueryMap,
    query_raw: String,
    fragment: String,
    source: String,
}

/// The six urlparse-style components of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts<'a> {
    /// Scheme.
    pub scheme: &'a str,
    /// `user:password@host:port`.
    pub netloc: String,
    /// Path.
    pub path: &'a str,
    /// `;params` segment without the `;`.
    pub params: &'a str,
    /// Raw query string without the `?`.
    pub query: &'a str,
    /// Fragment without the `#`.
    pub fragment: &'a str,
}

impl ParsedConnection {
    /// Parse a DSN without defaults.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dumpling_dsn::connection::ParsedConnection;
    ///
    /// let conn = ParsedConnection::parse("postgres+psycopg2://localhost/app#primary").unwrap();
    /// assert_eq!(conn.schemes(), ["postgres", "psycopg2"]);
    /// assert_eq!(conn.anchor(), "primary");
    ///
    /// assert!(ParsedConnection::parse("not-a-valid-dsn").is_err());
    /// ```
    pub fn parse(dsn: &str) -> ConnectionResult<Self> {
        Self::parse_with_defaults(dsn, std::iter::empty::<(&str, &str)>())
    }

    /// Parse a DSN, filling fields it leaves empty from `defaults`.
    ///
    /// Default keys are field names or their aliases (`host`, `user`,
    /// `secret`, `dbname`, ...). Any other key is an option default and lands
    /// in [`query`](Self::query) unless the query string already set it.
    pub fn parse_with_defaults<I, K, V>(dsn: &str, defaults: I) -> ConnectionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        debug!(dsn_len = dsn.len(), "ParsedConnection::parse()");

        if !DSN_SHAPE.is_match(dsn) {
            return Err(ConnectionError::InvalidUrl(
                "only full dsn urls (scheme://host...) are allowed".to_string(),
            ));
        }

        let (scheme, remainder) = dsn.split_once(':').ok_or_else(|| {
            ConnectionError::InvalidUrl("Missing scheme (e.g., postgres://)".to_string())
        })?;

        let (lenient_user, lenient_password, remainder) = split_credentials(remainder);
        let split = UrlSplit::parse(&remainder)?;
        let authority = Authority::parse(split.netloc);

        let username = non_empty(authority.username).or(lenient_user);
        let password = non_empty(authority.password).or(lenient_password);

        let (hostname, port, path) = if split.is_memory() {
            (None, None, MEMORY_SENTINEL.to_string())
        } else {
            let port = parse_port(authority.port)?;
            match authority.hostname {
                Some(host) if host == "." || host == ".." => {
                    (None, port, format!("{}{}", host, split.path))
                }
                host => (host, port, split.path.to_string()),
            }
        };
        let hostname = hostname.map(|host| percent_decode(&host));

        let mut query = parse_query(split.query);
        let mut merge = FieldMerge::new();
        merge.seed(Field::Scheme, Some(scheme.to_string()));
        merge.seed(Field::Username, username);
        merge.seed(Field::Password, password);
        merge.seed(Field::Hostname, hostname);
        merge.seed(Field::Port, port.map(|p| p.to_string()));
        merge.seed(Field::Path, Some(path));
        merge.seed(Field::Params, Some(split.params.to_string()));
        merge.seed(Field::Fragment, Some(split.fragment.to_string()));

        merge.apply_defaults(defaults, &mut query);
        merge.fold_query(&mut query)?;

        let conn = Self {
            scheme: merge.take(Field::Scheme).unwrap_or_default(),
            username: merge.take(Field::Username),
            password: merge.take(Field::Password),
            hostname: merge.take(Field::Hostname),
            port: parse_port(merge.get(Field::Port))?,
            path: merge.take(Field::Path).unwrap_or_default(),
            params: merge.take(Field::Params).unwrap_or_default(),
            query,
            query_raw: split.query.to_string(),
            fragment: merge.take(Field::Fragment).unwrap_or_default(),
            source: dsn.to_string(),
        };

        debug!(
            scheme = %conn.scheme,
            host = ?conn.hostname,
            port = ?conn.port,
            database = %conn.database(),
            "Connection parsed"
        );
        Ok(conn)
    }

    /// The input this connection was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The raw scheme, e.g. `postgres+psycopg2`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The scheme split on `+`.
    pub fn schemes(&self) -> Vec<&str> {
        self.scheme.split('+').collect()
    }

    /// The login name.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Alias for [`username`](Self::username), as psycopg2 names it.
    pub fn user(&self) -> Option<&str> {
        self.username()
    }

    /// The login password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Alias for [`password`](Self::password), as libpq names it.
    pub fn secret(&self) -> Option<&str> {
        self.password()
    }

    /// The decoded host name.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Alias for [`hostname`](Self::hostname).
    pub fn host(&self) -> Option<&str> {
        self.hostname()
    }

    /// The port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The path as written.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty path segments.
    pub fn paths(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// The database name.
    ///
    /// With a host the path is `/database`, so surrounding slashes are
    /// stripped. Without one the path is a file path (or `:memory:`) and is
    /// returned as is.
    pub fn database(&self) -> &str {
        if self.hostname.is_some() {
            self.path.trim_matches('/')
        } else {
            &self.path
        }
    }

    /// Alias for [`database`](Self::database).
    pub fn dbname(&self) -> &str {
        self.database()
    }

    /// The `;params` segment.
    pub fn params(&self) -> &str {
        &self.params
    }

    /// Query string options not consumed as fields.
    pub fn query(&self) -> &QueryMap {
        &self.query
    }

    /// A query option by key.
    pub fn query_value(&self, key: &str) -> Option<&QueryValue> {
        self.query.get(key)
    }

    /// The first value of a query option.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query_value(key).map(QueryValue::first)
    }

    /// The query string as written, without the `?`.
    pub fn query_raw(&self) -> &str {
        &self.query_raw
    }

    /// The fragment.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Alias for [`fragment`](Self::fragment).
    pub fn anchor(&self) -> &str {
        self.fragment()
    }

    /// `host:port`, with the host percent-encoded.
    pub fn hostloc(&self) -> String {
        let mut hostloc = self.hostname.as_deref().map(percent_encode).unwrap_or_default();
        if let Some(port) = self.port.filter(|&p| p != 0) {
            let _ = write!(hostloc, ":{}", port);
        }
        hostloc
    }

    /// `username:password@host:port`.
    pub fn netloc(&self) -> String {
        self.netloc_with(self.password.as_deref())
    }

    fn netloc_with(&self, password: Option<&str>) -> String {
        let mut netloc = String::new();
        let mut has_credentials = false;

        if let Some(user) = self.username.as_deref().filter(|u| !u.is_empty()) {
            netloc.push_str(user);
            has_credentials = true;
        }
        if let Some(pass) = password.filter(|p| !p.is_empty()) {
            netloc.push(':');
            netloc.push_str(pass);
            has_credentials = true;
        }
        if has_credentials {
            netloc.push('@');
        }

        netloc.push_str(&self.hostloc());
        netloc
    }

    /// Whether this names an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.hostname.is_none() && self.path == MEMORY_SENTINEL
    }

    /// The urlparse-style component view.
    pub fn parts(&self) -> UrlParts<'_> {
        UrlParts {
            scheme: &self.scheme,
            netloc: self.netloc(),
            path: &self.path,
            params: &self.params,
            query: &self.query_raw,
            fragment: &self.fragment,
        }
    }

    /// Set `field` to `value` if it is currently empty.
    ///
    /// Returns whether the value was applied.
    ///
    /// ```rust
    /// use dumpling_dsn::connection::{Field, ParsedConnection};
    ///
    /// let mut conn = ParsedConnection::parse("postgres://localhost/app").unwrap();
    /// assert!(conn.set_default(Field::Port, "5432").unwrap());
    /// assert!(!conn.set_default(Field::Hostname, "other").unwrap());
    /// assert_eq!(conn.hostloc(), "localhost:5432");
    /// ```
    pub fn set_default(&mut self, field: Field, value: impl Into<String>) -> ConnectionResult<bool> {
        let value = value.into();
        let applied = match field {
            Field::Scheme => fill(&mut self.scheme, value),
            Field::Username => fill_option(&mut self.username, value),
            Field::Password => fill_option(&mut self.password, value),
            Field::Hostname => fill_option(&mut self.hostname, value),
            Field::Port => match self.port {
                Some(port) if port != 0 => false,
                _ => {
                    self.port = parse_port(Some(&value))?;
                    self.port.is_some()
                }
            },
            Field::Path => fill(&mut self.path, value),
            Field::Params => fill(&mut self.params, value),
            Field::Fragment => fill(&mut self.fragment, value),
        };
        Ok(applied)
    }

    /// [`set_default`](Self::set_default) addressed by field name or alias.
    pub fn set_default_named(&mut self, name: &str, value: impl Into<String>) -> ConnectionResult<bool> {
        let field = name.parse::<Field>()?;
        self.set_default(field, value)
    }
}

/// Parse a DSN, filling empty fields from `defaults`.
///
/// ```rust
/// use dumpling_dsn::connection::parse;
///
/// let conn = parse("sqlite:///:memory:", [("fragment", "cache")]).unwrap();
/// assert_eq!(conn.hostname(), None);
/// assert_eq!(conn.path(), ":memory:");
/// assert_eq!(conn.fragment(), "cache");
/// ```
pub fn parse<I, K, V>(dsn: &str, defaults: I) -> ConnectionResult<ParsedConnection>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    ParsedConnection::parse_with_defaults(dsn, defaults)
}

impl FromStr for ParsedConnection {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ParsedConnection {
    /// Rebuild the DSN from its fields.
    ///
    /// The result always carries `//` so it parses again, but it is not
    /// necessarily byte-identical to [`source`](ParsedConnection::source).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_url(f, self.password.as_deref())
    }
}

impl ParsedConnection {
    /// The DSN with its password replaced by `mask`.
    ///
    /// ```rust
    /// use dumpling_dsn::connection::ParsedConnection;
    ///
    /// let conn = ParsedConnection::parse("postgres://u@db/app?password=hunter2").unwrap();
    /// assert_eq!(conn.to_masked_string("***"), "postgres://u:***@db/app");
    /// ```
    pub fn to_masked_string(&self, mask: &str) -> String {
        let mut out = String::new();
        let password = self.password.as_deref().filter(|p| !p.is_empty()).map(|_| mask);
        let _ = self.write_url(&mut out, password);
        out
    }

    fn write_url<W: Write>(&self, out: &mut W, password: Option<&str>) -> fmt::Result {
        let hostloc = self.hostloc();
        write!(out, "{}://{}", self.scheme, self.netloc_with(password))?;
        if !hostloc.is_empty() && !self.path.is_empty() && !self.path.starts_with('/') {
            out.write_char('/')?;
        }
        out.write_str(&self.path)?;
        if !self.params.is_empty() {
            write!(out, ";{}", self.params)?;
        }
        // Options folded into fields are dropped so the output re-parses.
        if parse_query(&self.query_raw) == self.query {
            if !self.query_raw.is_empty() {
                write!(out, "?{}", self.query_raw)?;
            }
        } else if !self.query.is_empty() {
            write!(out, "?{}", encode_query(&self.query))?;
        }
        if !self.fragment.is_empty() {
            write!(out, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// The remainder of a DSN after the scheme, split urlparse-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UrlSplit<'a> {
    netloc: &'a str,
    path: &'a str,
    params: &'a str,
    query: &'a str,
    fragment: &'a str,
}

impl<'a> UrlSplit<'a> {
    fn parse(input: &'a str) -> ConnectionResult<Self> {
        let (netloc, rest) = match input.strip_prefix("//") {
            Some(after) => {
                let end = after.find(['/', '?', '#']).unwrap_or(after.len());
                after.split_at(end)
            }
            None => ("", input),
        };

        if netloc.contains('[') != netloc.contains(']') {
            return Err(ConnectionError::InvalidUrl("Invalid IPv6 address".to_string()));
        }

        let (rest, fragment) = rest.split_once('#').unwrap_or((rest, ""));
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (path, params) = split_params(path);

        Ok(Self {
            netloc,
            path,
            params,
            query,
            fragment,
        })
    }

    /// `//:memory:`, or an empty authority followed by `/:memory:`.
    fn is_memory(&self) -> bool {
        self.netloc == MEMORY_SENTINEL
            || (self.netloc.is_empty() && self.path.strip_prefix('/') == Some(MEMORY_SENTINEL))
    }
}

/// The pieces of an authority component.
#[derive(Debug, Default, PartialEq, Eq)]
struct Authority<'a> {
    username: Option<&'a str>,
    password: Option<&'a str>,
    hostname: Option<String>,
    port: Option<&'a str>,
}

impl<'a> Authority<'a> {
    fn parse(netloc: &'a str) -> Self {
        let (userinfo, hostinfo) = match netloc.rsplit_once('@') {
            Some((userinfo, hostinfo)) => (Some(userinfo), hostinfo),
            None => (None, netloc),
        };

        let (username, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (Some(user), Some(pass)),
                None => (Some(info), None),
            },
            None => (None, None),
        };

        let (host, port) = match hostinfo.split_once('[') {
            Some((_, bracketed)) => {
                let (host, after) = bracketed.split_once(']').unwrap_or((bracketed, ""));
                (host, after.split_once(':').map_or("", |(_, port)| port))
            }
            None => hostinfo.split_once(':').unwrap_or((hostinfo, "")),
        };

        Self {
            username,
            password,
            hostname: (!host.is_empty()).then(|| lowercase_host(host)),
            port: (!port.is_empty()).then_some(port),
        }
    }
}

/// Strip a leading `//user:password@` using [`LENIENT_CREDENTIALS`], then
/// [`CREDENTIALS_TO_FIRST_AT`].
fn split_credentials(remainder: &str) -> (Option<String>, Option<String>, String) {
    let caps = LENIENT_CREDENTIALS.captures(remainder).or_else(|| {
        CREDENTIALS_TO_FIRST_AT
            .captures(remainder)
            .filter(|caps| caps.get(2).is_some_and(|m| !looks_like_port(m.as_str())))
    });
    match caps {
        Some(caps) => {
            let end = caps.get(0).map_or(0, |m| m.end());
            (
                caps.get(1).map(|m| m.as_str().to_string()),
                caps.get(2).map(|m| m.as_str().to_string()),
                format!("//{}", &remainder[end..]),
            )
        }
        None => (None, None, remainder.to_string()),
    }
}

/// `5432/db?x=a` in `host:5432/db?x=a@b` is a port and path, not a password.
fn looks_like_port(text: &str) -> bool {
    let head = text.split(['/', '?', '#']).next().unwrap_or_default();
    !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit())
}

/// Split `;params` off the last path segment.
fn split_params(path: &str) -> (&str, &str) {
    let last_segment = path.rfind('/').unwrap_or(0);
    match path[last_segment..].find(';') {
        Some(offset) => {
            let at = last_segment + offset;
            (&path[..at], &path[at + 1..])
        }
        None => (path, ""),
    }
}

fn parse_port(port: Option<&str>) -> ConnectionResult<Option<u16>> {
    match port {
        None | Some("") => Ok(None),
        Some(port) if port.bytes().all(|b| b.is_ascii_digit()) => port
            .parse()
            .map(Some)
            .map_err(|_| ConnectionError::InvalidUrl(format!("Port out of range 0-65535: {}", port))),
        Some(port) => Err(ConnectionError::InvalidUrl(format!(
            "Port could not be cast to integer value: {}",
            port
        ))),
    }
}

/// Lower-case a host up to its first `%`, leaving escapes and zone ids alone.
fn lowercase_host(host: &str) -> String {
    match host.split_once('%') {
        Some((name, rest)) => format!("{}%{}", name.to_lowercase(), rest),
        None => host.to_lowercase(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn fill(slot: &mut String, value: String) -> bool {
    if slot.is_empty() && !value.is_empty() {
        *slot = value;
        true
    } else {
        false
    }
}

fn fill_option(slot: &mut Option<String>, value: String) -> bool {
    match slot {
        Some(existing) if !existing.is_empty() => false,
        _ if value.is_empty() => false,
        _ => {
            *slot = Some(value);
            true
        }
    }
}

/// Decode `%XX` escapes. `+` is left alone; invalid escapes pass through.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(hex) = bytes.get(i + 1..i + 3) {
                if hex.iter().all(u8::is_ascii_hexdigit) {
                    let hex = std::str::from_utf8(hex).unwrap_or_default();
                    if let Ok(byte) = u8::from_str_radix(hex, 16) {
                        decoded.push(byte);
                        i += 3;
                        continue;
                    }
                }
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

/// Percent-encode everything except unreserved characters.
fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }
    encoded
}
