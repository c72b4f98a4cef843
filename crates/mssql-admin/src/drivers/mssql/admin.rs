//! Raw-statement administration engine.
//!
//! Implements [`DataAccess`] plus the DDL operations that only this backend
//! offers. Each call validates its names, opens a connection for the right
//! scope, runs its statements and closes the connection again.
//!
//! Create/drop operations are idempotent: an existence probe with bound
//! parameters runs first and the call returns `false` without issuing DDL
//! when the target is already in the requested state.

use async_trait::async_trait;
use tiberius::ToSql;
use tracing::{debug, info};

use crate::core::identifier::{
    qualify, validate_data_type, validate_identifier, AllowedDataType, SafeIdentifier,
};
use crate::core::schema::{ColumnTypeMap, KeyColumnSet, TableData};
use crate::core::traits::DataAccess;
use crate::error::{AdminError, Result};

use super::catalog::{self, DEFAULT_SCHEMA};
use super::connection::{self, MssqlClient};
use super::scope::{ConnectionScope, ConnectionString};

/// Name of the identity key column given to new tables.
pub const IDENTITY_COLUMN: &str = "Id";

/// Backend label for results produced here.
pub const RAW_PROVIDER: &str = "SQL";

/// Administration engine that issues hand-built statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawAdminEngine;

impl RawAdminEngine {
    pub fn new() -> Self {
        Self
    }

    /// Open the server root and run `SELECT 1`.
    pub async fn test_connection(&self, base: &ConnectionString) -> Result<()> {
        let mut client = connection::open(&ConnectionScope::server_root(base)).await?;
        connection::ping(&mut client).await?;
        connection::close(client).await;
        debug!("Connection test succeeded");
        Ok(())
    }

    /// Create database `name`. Returns `false` if it already exists.
    pub async fn create_database(&self, base: &ConnectionString, name: &str) -> Result<bool> {
        let name = validate_identifier(name)?;
        let mut client = connection::open(&ConnectionScope::server_root(base)).await?;

        if database_exists(&mut client, &name).await? {
            debug!("Database {} already exists", name);
            connection::close(client).await;
            return Ok(false);
        }

        let sql = format!("CREATE DATABASE {}", name.quoted());
        client.execute(&sql, &[]).await?;
        connection::close(client).await;

        info!("Created database {}", name);
        Ok(true)
    }

    /// Drop database `name`, rolling back other sessions first.
    /// Returns `false` if it does not exist.
    pub async fn drop_database(&self, base: &ConnectionString, name: &str) -> Result<bool> {
        let name = validate_identifier(name)?;
        let mut client = connection::open(&ConnectionScope::server_root(base)).await?;

        if !database_exists(&mut client, &name).await? {
            debug!("Database {} does not exist", name);
            connection::close(client).await;
            return Ok(false);
        }

        let sql = format!(
            "ALTER DATABASE {db} SET SINGLE_USER WITH ROLLBACK IMMEDIATE; DROP DATABASE {db};",
            db = name.quoted()
        );
        client.execute(&sql, &[]).await?;
        connection::close(client).await;

        info!("Dropped database {}", name);
        Ok(true)
    }

    /// Create `table` in `db` with a single identity primary key column.
    /// Returns `false` if the table already exists.
    pub async fn create_table(&self, base: &ConnectionString, db: &str, table: &str) -> Result<bool> {
        let (db, table) = (validate_identifier(db)?, validate_identifier(table)?);
        let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;

        if table_exists(&mut client, &table).await? {
            debug!("Table {}.{} already exists", db, table);
            connection::close(client).await;
            return Ok(false);
        }

        let sql = create_table_sql(&table)?;
        client.execute(&sql, &[]).await?;
        connection::close(client).await;

        info!("Created table {}.{}", db, table);
        Ok(true)
    }

    /// Drop `table` from `db`. Returns `false` if it does not exist.
    pub async fn drop_table(&self, base: &ConnectionString, db: &str, table: &str) -> Result<bool> {
        let (db, table) = (validate_identifier(db)?, validate_identifier(table)?);
        let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;

        if !table_exists(&mut client, &table).await? {
            debug!("Table {}.{} does not exist", db, table);
            connection::close(client).await;
            return Ok(false);
        }

        let sql = format!("DROP TABLE {}", qualify(&dbo()?, &table));
        client.execute(&sql, &[]).await?;
        connection::close(client).await;

        info!("Dropped table {}.{}", db, table);
        Ok(true)
    }

    /// Add a nullable column of an allow-listed type.
    /// Returns `false` if the column already exists.
    pub async fn create_column(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
        column: &str,
        data_type: &str,
    ) -> Result<bool> {
        let db = validate_identifier(db)?;
        let table = validate_identifier(table)?;
        let column = validate_identifier(column)?;
        let data_type = validate_data_type(data_type)?;
        let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;

        if column_exists(&mut client, &table, &column).await? {
            debug!("Column {}.{}.{} already exists", db, table, column);
            connection::close(client).await;
            return Ok(false);
        }

        let sql = add_column_sql(&table, &column, data_type)?;
        client.execute(&sql, &[]).await?;
        connection::close(client).await;

        info!("Added column {}.{}.{} {}", db, table, column, data_type);
        Ok(true)
    }

    /// Drop a column. Returns `false` if it does not exist.
    pub async fn drop_column(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
        column: &str,
    ) -> Result<bool> {
        let db = validate_identifier(db)?;
        let table = validate_identifier(table)?;
        let column = validate_identifier(column)?;
        let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;

        if !column_exists(&mut client, &table, &column).await? {
            debug!("Column {}.{}.{} does not exist", db, table, column);
            connection::close(client).await;
            return Ok(false);
        }

        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            qualify(&dbo()?, &table),
            column.quoted()
        );
        client.execute(&sql, &[]).await?;
        connection::close(client).await;

        info!("Dropped column {}.{}.{}", db, table, column);
        Ok(true)
    }
}

#[async_trait]
impl DataAccess for RawAdminEngine {
    fn provider_name(&self) -> &'static str {
        RAW_PROVIDER
    }

    async fn list_databases(&self, base: &ConnectionString) -> Result<Vec<String>> {
        catalog::scoped_databases(base).await
    }

    async fn list_tables(&self, base: &ConnectionString, db: &str) -> Result<Vec<String>> {
        catalog::scoped_tables(base, db).await
    }

    async fn get_column_types(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<ColumnTypeMap> {
        catalog::scoped_column_types(base, db, table).await
    }

    async fn get_primary_key_columns(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<KeyColumnSet> {
        catalog::scoped_primary_key(base, db, table).await
    }

    async fn get_foreign_key_columns(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<KeyColumnSet> {
        catalog::scoped_foreign_keys(base, db, table).await
    }

    async fn fetch_rows(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
        max_rows: i32,
    ) -> Result<TableData> {
        catalog::scoped_rows(base, db, table, max_rows).await
    }
}

/// Reject non-positive row limits.
pub fn validate_max_rows(max_rows: i32) -> Result<()> {
    if max_rows <= 0 {
        return Err(AdminError::Validation(format!(
            "Max rows must be greater than 0 (got {})",
            max_rows
        )));
    }
    Ok(())
}

fn dbo() -> Result<SafeIdentifier> {
    validate_identifier(DEFAULT_SCHEMA)
}

fn create_table_sql(table: &SafeIdentifier) -> Result<String> {
    let id = validate_identifier(IDENTITY_COLUMN)?;
    // Names near the length limit leave no room for the prefix; the server names those.
    let constraint = match validate_identifier(&format!("PK_{}", table)) {
        Ok(pk_name) => format!("CONSTRAINT {} PRIMARY KEY", pk_name.quoted()),
        Err(_) => "PRIMARY KEY".to_string(),
    };
    Ok(format!(
        "CREATE TABLE {} ({} INT IDENTITY(1,1) NOT NULL {})",
        qualify(&dbo()?, table),
        id.quoted(),
        constraint
    ))
}

fn add_column_sql(
    table: &SafeIdentifier,
    column: &SafeIdentifier,
    data_type: AllowedDataType,
) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD {} {} NULL",
        qualify(&dbo()?, table),
        column.quoted(),
        data_type
    ))
}

async fn probe(client: &mut MssqlClient, sql: &str, params: &[&dyn ToSql]) -> Result<bool> {
    let row = client.query(sql, params).await?.into_row().await?;
    Ok(row.and_then(|r| r.get::<i32, _>(0)).is_some())
}

async fn database_exists(client: &mut MssqlClient, name: &SafeIdentifier) -> Result<bool> {
    probe(client, "SELECT DB_ID(@P1)", &[&name.as_str()]).await
}

async fn table_exists(client: &mut MssqlClient, table: &SafeIdentifier) -> Result<bool> {
    let qualified = qualify(&dbo()?, table);
    probe(client, "SELECT OBJECT_ID(@P1, N'U')", &[&qualified.as_str()]).await
}

async fn column_exists(
    client: &mut MssqlClient,
    table: &SafeIdentifier,
    column: &SafeIdentifier,
) -> Result<bool> {
    let qualified = qualify(&dbo()?, table);
    probe(
        client,
        "SELECT CAST(COL_LENGTH(@P1, @P2) AS INT)",
        &[&qualified.as_str(), &column.as_str()],
    )
    .await
}
