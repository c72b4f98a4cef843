//! Core traits shared by the data-access backends.
//!
//! - [`DataAccess`]: catalog browsing and row reads, implemented by both the
//!   raw admin engine and the mapping engine so the router can forward calls
//!   without the caller knowing which backend answered.

use async_trait::async_trait;

use crate::drivers::mssql::ConnectionString;
use crate::error::Result;

use super::schema::{ColumnTypeMap, KeyColumnSet, TableData};

/// Uniform data-access contract.
///
/// Every call derives its own connection scope from `base`, opens a fresh
/// connection, and releases it before returning. Names are validated before
/// any statement is built.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Backend label attached to routed results (`"SQL"` or `"ORM"`).
    fn provider_name(&self) -> &'static str;

    /// User databases, alphabetically ordered. System databases are excluded.
    async fn list_databases(&self, base: &ConnectionString) -> Result<Vec<String>>;

    /// Base tables in the `dbo` schema of `db`, alphabetically ordered.
    async fn list_tables(&self, base: &ConnectionString, db: &str) -> Result<Vec<String>>;

    /// Canonical declared type of every column, in physical order.
    async fn get_column_types(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<ColumnTypeMap>;

    async fn get_primary_key_columns(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<KeyColumnSet>;

    /// Columns of `table` that reference another table.
    async fn get_foreign_key_columns(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<KeyColumnSet>;

    /// At most `max_rows` rows in server order.
    ///
    /// # Errors
    ///
    /// `AdminError::Validation` when `max_rows <= 0`, before any connection
    /// is opened.
    async fn fetch_rows(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
        max_rows: i32,
    ) -> Result<TableData>;
}
