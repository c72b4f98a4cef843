//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::drivers::mssql::ConnectionString;
use crate::error::Result;
use crate::router::BackendKind;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server connection.
    pub connection: ConnectionConfig,

    /// Administration defaults.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// SQL Server connection settings.
///
/// Either a full `connection_string` or the discrete fields. When both are
/// present the connection string wins.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// ADO.NET-style connection string.
    #[serde(default, skip_serializing)]
    pub connection_string: Option<String>,

    /// Server host.
    #[serde(default)]
    pub host: String,

    /// Server port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// SQL login.
    #[serde(default)]
    pub user: String,

    /// Password. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Encrypt the whole session (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust the server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl ConnectionConfig {
    /// Base connection string every scope is derived from.
    pub fn connection_string(&self) -> Result<ConnectionString> {
        if let Some(text) = &self.connection_string {
            return ConnectionString::parse(text);
        }

        Ok([
            ("Server", format!("tcp:{},{}", self.host, self.port)),
            ("User Id", self.user.clone()),
            ("Password", self.password.clone()),
            ("Encrypt", self.encrypt.to_string()),
            ("TrustServerCertificate", self.trust_server_cert.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect())
    }
}

// Custom Debug implementation to redact password
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connection_string = self.connection_string.as_deref().map(|text| {
            ConnectionString::parse(text)
                .map(|cs| format!("{:?}", cs))
                .unwrap_or_else(|_| "[REDACTED]".to_string())
        });

        f.debug_struct("ConnectionConfig")
            .field("connection_string", &connection_string)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Administration defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Backend used when a command does not choose one (default: raw).
    #[serde(default)]
    pub mode: BackendKind,

    /// Row limit for `rows` when none is given (default: 100).
    #[serde(default = "default_max_rows")]
    pub max_rows: i32,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            mode: BackendKind::default(),
            max_rows: default_max_rows(),
        }
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

fn default_max_rows() -> i32 {
    100
}
