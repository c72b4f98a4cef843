//! Microsoft SQL Server driver.
//!
//! - [`scope`]: connection scopes derived from a base connection string
//! - [`connection`]: one Tiberius client per scoped call
//! - [`catalog`]: parameterized introspection queries and row decoding
//! - [`RawAdminEngine`]: raw-statement administration backend

pub mod admin;
pub mod catalog;
pub mod connection;
pub mod scope;

pub use admin::{validate_max_rows, RawAdminEngine, IDENTITY_COLUMN, RAW_PROVIDER};
pub use connection::MssqlClient;
pub use scope::{ConnectionScope, ConnectionString, ScopeTarget, SERVER_ROOT_CATALOG};
