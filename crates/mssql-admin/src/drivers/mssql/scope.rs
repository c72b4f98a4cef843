//! Connection scopes derived from a base ADO.NET-style connection string.
//!
//! Every operation targets either the server's administrative root
//! (`master`, for create/drop/list of databases) or one named database.
//! The scope rewrites the catalog of the base string and drops any
//! local-file attach directive; no connection is opened here.

use std::fmt;
use std::str::FromStr;

use tiberius::Config;

use crate::core::identifier::SafeIdentifier;
use crate::error::{AdminError, Result};

/// Catalog used for server-wide administration.
pub const SERVER_ROOT_CATALOG: &str = "master";

/// Keys that select the initial catalog. The first one present is replaced.
const CATALOG_KEYS: &[&str] = &["database", "initial catalog", "databasename"];

/// Keys that attach a local database file instead of a server catalog.
const ATTACH_KEYS: &[&str] = &["attachdbfilename", "initial file name", "extended properties"];

/// Keys whose values must never appear in logs or debug output.
const SECRET_KEYS: &[&str] = &["password", "pwd"];

/// Ordered `key=value` pairs of a connection string.
///
/// Keys compare case-insensitively and keep their original spelling and
/// position when rewritten.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: Vec<(String, String)>,
}

impl ConnectionString {
    /// Parse `key=value;key=value` text.
    ///
    /// Values may be wrapped in single or double quotes (a doubled quote
    /// inside escapes itself) or in braces. Empty segments are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        let mut chars = text.chars().peekable();

        loop {
            // Key runs up to '='
            let mut key = String::new();
            let mut saw_eq = false;
            while let Some(c) = chars.next() {
                match c {
                    '=' => {
                        saw_eq = true;
                        break;
                    }
                    ';' if key.trim().is_empty() => key.clear(),
                    ';' => {
                        return Err(AdminError::Config(format!(
                            "Connection string segment {:?} has no value",
                            key.trim()
                        )))
                    }
                    _ => key.push(c),
                }
            }

            let key = key.trim().to_string();
            if !saw_eq {
                if key.is_empty() {
                    break;
                }
                return Err(AdminError::Config(format!(
                    "Connection string segment {:?} has no value",
                    key
                )));
            }
            if key.is_empty() {
                return Err(AdminError::Config(
                    "Connection string contains an empty key".into(),
                ));
            }

            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }

            let value = match chars.peek().copied() {
                Some(quote @ ('\'' | '"')) => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        if c == quote {
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                value.push(quote);
                            } else {
                                closed = true;
                                break;
                            }
                        } else {
                            value.push(c);
                        }
                    }
                    if !closed {
                        return Err(AdminError::Config(format!(
                            "Unterminated quoted value for {:?}",
                            key
                        )));
                    }
                    // Skip to the separator
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                    value
                }
                Some('{') => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        value.push(c);
                    }
                    if !closed {
                        return Err(AdminError::Config(format!(
                            "Unterminated braced value for {:?}",
                            key
                        )));
                    }
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                    value
                }
                _ => {
                    let mut value = String::new();
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                        value.push(c);
                    }
                    value.trim().to_string()
                }
            };

            pairs.push((key, value));
        }

        Ok(Self { pairs })
    }

    /// Value of `key`, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value of `key` in place, or append it.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    /// Remove every occurrence of `key`.
    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render back to connection string text, quoting values that need it.
    ///
    /// The result contains the password; do not log it.
    pub fn to_ado_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, quote_value(v)))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Point the string at `catalog`, replacing the first catalog key found.
    fn with_catalog(&self, catalog: &str) -> Self {
        let mut pairs: Vec<(String, String)> = Vec::with_capacity(self.pairs.len() + 1);
        let mut placed = false;

        for (k, v) in &self.pairs {
            let lower = k.to_ascii_lowercase();
            if ATTACH_KEYS.contains(&lower.as_str()) {
                continue;
            }
            if CATALOG_KEYS.contains(&lower.as_str()) {
                if !placed {
                    pairs.push(("Database".to_string(), catalog.to_string()));
                    placed = true;
                }
                continue;
            }
            pairs.push((k.clone(), v.clone()));
        }

        if !placed {
            pairs.push(("Database".to_string(), catalog.to_string()));
        }

        Self { pairs }
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.contains(';')
        || value.contains('\'')
        || value.contains('"')
        || value.starts_with('{')
        || value != value.trim();
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl FromStr for ConnectionString {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromIterator<(String, String)> for ConnectionString {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut cs = ConnectionString::default();
        for (k, v) in iter {
            cs.set(&k, v);
        }
        cs
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in &self.pairs {
            if SECRET_KEYS.contains(&k.to_ascii_lowercase().as_str()) {
                map.entry(k, &"[REDACTED]");
            } else {
                map.entry(k, v);
            }
        }
        map.finish()
    }
}

/// Catalog a scope connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTarget {
    ServerRoot,
    NamedDatabase(SafeIdentifier),
}

/// A base connection string resolved to one target catalog.
///
/// Built fresh for every call and never stored.
#[derive(Debug, Clone)]
pub struct ConnectionScope {
    target: ScopeTarget,
    connection_string: ConnectionString,
}

impl ConnectionScope {
    /// Scope for server-wide administration (`master`).
    pub fn server_root(base: &ConnectionString) -> Self {
        Self {
            target: ScopeTarget::ServerRoot,
            connection_string: base.with_catalog(SERVER_ROOT_CATALOG),
        }
    }

    /// Scope for work inside one database.
    pub fn database(base: &ConnectionString, db: &SafeIdentifier) -> Self {
        Self {
            target: ScopeTarget::NamedDatabase(db.clone()),
            connection_string: base.with_catalog(db.as_str()),
        }
    }

    pub fn target(&self) -> &ScopeTarget {
        &self.target
    }

    /// Catalog name this scope points at.
    pub fn catalog(&self) -> &str {
        match &self.target {
            ScopeTarget::ServerRoot => SERVER_ROOT_CATALOG,
            ScopeTarget::NamedDatabase(db) => db.as_str(),
        }
    }

    pub fn connection_string(&self) -> &ConnectionString {
        &self.connection_string
    }

    /// Driver configuration for this scope.
    pub fn to_config(&self) -> Result<Config> {
        Config::from_ado_string(&self.connection_string.to_ado_string()).map_err(|e| {
            AdminError::Config(format!(
                "Invalid connection string for catalog {}: {}",
                self.catalog(),
                e
            ))
        })
    }
}
