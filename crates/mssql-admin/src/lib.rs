//! # mssql-admin
//!
//! SQL Server administration library with two interchangeable backends.
//!
//! - **Raw admin engine**: idempotent create/drop of databases, tables and
//!   columns plus catalog introspection, built from validated identifiers
//!   and an allow-list of declared types
//! - **Mapping engine**: the same catalog reads, plus in-memory tracking of
//!   a single row of any table through entity models synthesized at runtime
//! - **Provider router**: forwards each call to the backend named by its
//!   operation context and tags the result with the producing backend
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_admin::{BackendKind, Config, OperationContext, ProviderRouter};
//!
//! #[tokio::main]
//! async fn main() -> mssql_admin::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let base = config.connection.connection_string()?;
//!     let router = ProviderRouter::default();
//!
//!     let ctx = OperationContext::new(BackendKind::Mapped, "example");
//!     let dbs = router.list_databases(&ctx, &base).await?;
//!     println!("{} databases via {}", dbs.data.len(), dbs.provider);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod mapping;
pub mod router;
pub mod typemap;

// Re-exports for convenient access
pub use config::{AdminConfig, Config, ConnectionConfig};
pub use crate::core::{
    validate_data_type, validate_identifier, ColumnTypeMap, DataAccess, FieldSpec, KeyColumnSet,
    SafeIdentifier, SqlValue, TableData, ValueKind, ALLOWED_DATA_TYPES,
};
pub use drivers::mssql::{ConnectionScope, ConnectionString, RawAdminEngine};
pub use error::{AdminError, Result};
pub use mapping::{MappedEngine, RowTrackingSession, TrackingSnapshot};
pub use router::{BackendKind, DataAccessResult, ModeSelector, OperationContext, ProviderRouter};
