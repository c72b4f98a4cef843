//! Mapping backend: catalog reads plus row tracking.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::identifier::validate_identifier;
use crate::core::schema::{ColumnTypeMap, FieldSpec, KeyColumnSet, TableData};
use crate::core::traits::DataAccess;
use crate::core::value::SqlValue;
use crate::drivers::mssql::catalog;
use crate::drivers::mssql::connection;
use crate::drivers::mssql::{ConnectionScope, ConnectionString};
use crate::error::{AdminError, Result};

use super::entity::TrackedEntity;
use super::model::{ModelCache, TrackingModelDescriptor};
use super::session::RowTrackingSession;

/// Backend label for results produced here.
pub const MAPPED_PROVIDER: &str = "ORM";

/// The single key column a table's rows can be tracked by.
///
/// # Errors
///
/// `AdminError::Validation` when the table has no primary key or a
/// composite one.
pub fn tracking_key(primary_key: &KeyColumnSet) -> Result<String> {
    let mut columns = primary_key.iter();
    match (columns.next(), columns.next()) {
        (Some(column), None) => Ok(column.to_string()),
        (None, _) => Err(AdminError::validation(
            "Row tracking requires a primary key; the table has none",
        )),
        (Some(_), Some(_)) => Err(AdminError::Validation(format!(
            "Row tracking requires a single-column primary key; the table has {} key columns",
            primary_key.len()
        ))),
    }
}

/// Data access through runtime entity models.
///
/// Catalog calls return the same data as the raw engine. Row tracking
/// compiles (or reuses) an entity model for the table shape and loads
/// one row into a [`RowTrackingSession`].
#[derive(Debug, Clone, Default)]
pub struct MappedEngine {
    models: Arc<ModelCache>,
}

impl MappedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine sharing an existing model cache.
    pub fn with_cache(models: Arc<ModelCache>) -> Self {
        Self { models }
    }

    pub fn model_cache(&self) -> &Arc<ModelCache> {
        &self.models
    }

    /// Load the row of `table` whose key equals `key_value` as a tracked entity.
    ///
    /// `fields` are the column/kind pairs of the loaded result set (see
    /// [`TableData::field_specs`]). The key value is coerced to the kind
    /// recorded for the key column before the lookup.
    ///
    /// # Errors
    ///
    /// - `AdminError::Validation` for bad names, a null key, a key column not
    ///   among `fields`, or a key value that cannot be converted.
    /// - `AdminError::NotFound` when no row has that key; the connection
    ///   opened for the attempt is closed first.
    pub async fn start_tracking(
        &self,
        base: &ConnectionString,
        db: &str,
        table: &str,
        key_column: &str,
        key_value: SqlValue,
        fields: &[FieldSpec],
    ) -> Result<RowTrackingSession> {
        let db_ident = validate_identifier(db)?;
        validate_identifier(table)?;
        validate_identifier(key_column)?;

        if key_value.is_null() {
            return Err(AdminError::validation("Primary key value must not be null"));
        }

        let descriptor = TrackingModelDescriptor::new(db, table, key_column, fields);
        let model = self.models.get_or_compile(&descriptor)?;
        let key_value = model.key_kind().coerce(key_value)?;

        let mut client = connection::open(&ConnectionScope::database(base, &db_ident)).await?;
        let row = match catalog::fetch_row_by_key(
            &mut client,
            model.table(),
            model.columns(),
            model.key_column(),
            &key_value,
        )
        .await
        {
            Ok(row) => row,
            Err(e) => {
                connection::close(client).await;
                return Err(e);
            }
        };

        let Some(values) = row else {
            connection::close(client).await;
            warn!(
                "Row {} = {} of {}.{} could not be loaded for tracking",
                model.key_column(),
                key_value,
                db,
                table
            );
            return Err(AdminError::NotFound(format!(
                "No row in {}.{} with {} = {}",
                db,
                table,
                model.key_column(),
                key_value
            )));
        };

        debug!("Loaded {} = {} from {}.{}", model.key_column(), key_value, db, table);
        match TrackedEntity::new(model, values) {
            Ok(entity) => Ok(RowTrackingSession::new(client, entity)),
            Err(e) => {
                connection::close(client).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl DataAccess for MappedEngine {
    fn provider_name(&self) -> &'static str {
        MAPPED_PROVIDER
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
