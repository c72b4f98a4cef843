//! Introspection queries and row decoding shared by both backends.
//!
//! Every statement here binds its values as parameters. The only
//! interpolated tokens are bracket-quoted [`SafeIdentifier`]s.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{ColumnData, ColumnType, Query, Row, ToSql};
use tracing::debug;

use crate::core::identifier::{qualify, validate_identifier, SafeIdentifier};
use crate::core::schema::{ColumnDescriptor, ColumnMeta, ColumnTypeMap, KeyColumnSet, TableData};
use crate::core::value::{SqlValue, ValueKind};
use crate::error::Result;
use crate::typemap;

use super::admin::validate_max_rows;
use super::connection::{self, MssqlClient};
use super::scope::{ConnectionScope, ConnectionString};

/// Schema every table operation works in.
pub const DEFAULT_SCHEMA: &str = "dbo";

const MONEY_SCALE: u32 = 4;

const LIST_DATABASES_SQL: &str = "\
SELECT [name]
FROM sys.databases
WHERE [name] NOT IN ('master', 'model', 'msdb', 'tempdb')
ORDER BY [name]";

const LIST_TABLES_SQL: &str = "\
SELECT t.[name]
FROM sys.tables t
INNER JOIN sys.schemas s ON s.[schema_id] = t.[schema_id]
WHERE s.[name] = @P1
ORDER BY t.[name]";

const COLUMN_TYPES_SQL: &str = "\
SELECT
    c.[name],
    ty.[name],
    CAST(c.[max_length] AS INT),
    CAST(c.[precision] AS INT),
    CAST(c.[scale] AS INT)
FROM sys.columns c
INNER JOIN sys.tables t ON t.[object_id] = c.[object_id]
INNER JOIN sys.schemas s ON s.[schema_id] = t.[schema_id]
INNER JOIN sys.types ty ON ty.[user_type_id] = c.[user_type_id]
WHERE s.[name] = @P1
  AND t.[name] = @P2
ORDER BY c.[column_id]";

const PRIMARY_KEY_SQL: &str = "\
SELECT c.[name]
FROM sys.tables t
INNER JOIN sys.schemas s ON s.[schema_id] = t.[schema_id]
INNER JOIN sys.indexes i ON i.[object_id] = t.[object_id] AND i.[is_primary_key] = 1
INNER JOIN sys.index_columns ic ON ic.[object_id] = i.[object_id] AND ic.[index_id] = i.[index_id]
INNER JOIN sys.columns c ON c.[object_id] = t.[object_id] AND c.[column_id] = ic.[column_id]
WHERE s.[name] = @P1
  AND t.[name] = @P2
ORDER BY ic.[key_ordinal]";

const FOREIGN_KEY_SQL: &str = "\
SELECT DISTINCT pc.[name]
FROM sys.tables t
INNER JOIN sys.schemas s ON s.[schema_id] = t.[schema_id]
INNER JOIN sys.foreign_key_columns fkc ON fkc.[parent_object_id] = t.[object_id]
INNER JOIN sys.columns pc ON pc.[object_id] = fkc.[parent_object_id] AND pc.[column_id] = fkc.[parent_column_id]
WHERE s.[name] = @P1
  AND t.[name] = @P2
ORDER BY pc.[name]";

/// User databases on the server, alphabetically.
pub async fn load_databases(client: &mut MssqlClient) -> Result<Vec<String>> {
    let rows = client
        .simple_query(LIST_DATABASES_SQL)
        .await?
        .into_first_result()
        .await?;
    Ok(first_column_strings(&rows))
}

/// Tables in the default schema of the connected database.
pub async fn load_tables(client: &mut MssqlClient) -> Result<Vec<String>> {
    let mut query = Query::new(LIST_TABLES_SQL);
    query.bind(DEFAULT_SCHEMA);
    let rows = query.query(client).await?.into_first_result().await?;
    Ok(first_column_strings(&rows))
}

/// Declared types of `table`'s columns in physical order.
pub async fn load_column_types(
    client: &mut MssqlClient,
    table: &SafeIdentifier,
) -> Result<ColumnTypeMap> {
    let mut query = Query::new(COLUMN_TYPES_SQL);
    query.bind(DEFAULT_SCHEMA);
    query.bind(table.as_str());
    let rows = query.query(client).await?.into_first_result().await?;

    let columns = rows
        .iter()
        .filter_map(|row| {
            let name: &str = row.get(0)?;
            let type_name: &str = row.get(1)?;
            let max_length: i32 = row.get(2).unwrap_or(0);
            let precision: i32 = row.get(3).unwrap_or(0);
            let scale: i32 = row.get(4).unwrap_or(0);
            Some(ColumnDescriptor {
                name: name.to_string(),
                data_type: typemap::canonicalize(type_name, max_length, precision, scale),
            })
        })
        .collect::<Vec<_>>();

    debug!("Loaded {} column types for {}", columns.len(), table);
    Ok(ColumnTypeMap::new(columns))
}

pub async fn load_primary_key(
    client: &mut MssqlClient,
    table: &SafeIdentifier,
) -> Result<KeyColumnSet> {
    load_key_columns(client, PRIMARY_KEY_SQL, table).await
}

pub async fn load_foreign_keys(
    client: &mut MssqlClient,
    table: &SafeIdentifier,
) -> Result<KeyColumnSet> {
    load_key_columns(client, FOREIGN_KEY_SQL, table).await
}

async fn load_key_columns(
    client: &mut MssqlClient,
    sql: &'static str,
    table: &SafeIdentifier,
) -> Result<KeyColumnSet> {
    let mut query = Query::new(sql);
    query.bind(DEFAULT_SCHEMA);
    query.bind(table.as_str());
    let rows = query.query(client).await?.into_first_result().await?;
    Ok(first_column_strings(&rows).into_iter().collect())
}

/// Fetch at most `max_rows` rows of `table` in server order.
///
/// `max_rows` is bound as a parameter; the caller validates it.
pub async fn fetch_table_data(
    client: &mut MssqlClient,
    table: &SafeIdentifier,
    max_rows: i32,
) -> Result<TableData> {
    let schema = schema_identifier()?;
    let sql = format!("SELECT TOP (@P1) * FROM {}", qualify(&schema, table));
    debug!("Fetching rows: {}", sql);

    let mut stream = client.query(sql, &[&max_rows]).await?;
    let columns = stream
        .columns()
        .await?
        .map(|cols| cols.iter().map(column_meta).collect::<Vec<_>>())
        .unwrap_or_default();
    let rows = stream.into_first_result().await?;

    let rows = rows.iter().map(convert_row).collect::<Vec<_>>();
    debug!("Fetched {} rows from {}", rows.len(), table);

    Ok(TableData { columns, rows })
}

/// Load one row by its key, selecting exactly `columns` in the given order.
///
/// Returns `None` when no row matches.
pub async fn fetch_row_by_key(
    client: &mut MssqlClient,
    table: &SafeIdentifier,
    columns: &[SafeIdentifier],
    key_column: &SafeIdentifier,
    key_value: &SqlValue,
) -> Result<Option<Vec<SqlValue>>> {
    let schema = schema_identifier()?;
    let select_list = columns
        .iter()
        .map(SafeIdentifier::quoted)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = @P1",
        select_list,
        qualify(&schema, table),
        key_column.quoted()
    );
    debug!("Loading tracked row: {}", sql);

    let param = sql_value_to_sql_param(key_value);
    let rows = client
        .query(sql, &[param.as_ref()])
        .await?
        .into_first_result()
        .await?;

    Ok(rows.first().map(convert_row))
}

// Scoped calls: open a connection for the call, run one query, close it.

pub async fn scoped_databases(base: &ConnectionString) -> Result<Vec<String>> {
    let mut client = connection::open(&ConnectionScope::server_root(base)).await?;
    let names = load_databases(&mut client).await?;
    connection::close(client).await;
    Ok(names)
}

pub async fn scoped_tables(base: &ConnectionString, db: &str) -> Result<Vec<String>> {
    let db = validate_identifier(db)?;
    let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;
    let names = load_tables(&mut client).await?;
    connection::close(client).await;
    Ok(names)
}

pub async fn scoped_column_types(
    base: &ConnectionString,
    db: &str,
    table: &str,
) -> Result<ColumnTypeMap> {
    let (db, table) = (validate_identifier(db)?, validate_identifier(table)?);
    let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;
    let types = load_column_types(&mut client, &table).await?;
    connection::close(client).await;
    Ok(types)
}

pub async fn scoped_primary_key(
    base: &ConnectionString,
    db: &str,
    table: &str,
) -> Result<KeyColumnSet> {
    let (db, table) = (validate_identifier(db)?, validate_identifier(table)?);
    let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;
    let keys = load_primary_key(&mut client, &table).await?;
    connection::close(client).await;
    Ok(keys)
}

pub async fn scoped_foreign_keys(
    base: &ConnectionString,
    db: &str,
    table: &str,
) -> Result<KeyColumnSet> {
    let (db, table) = (validate_identifier(db)?, validate_identifier(table)?);
    let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;
    let keys = load_foreign_keys(&mut client, &table).await?;
    connection::close(client).await;
    Ok(keys)
}

/// Validates `max_rows` before connecting.
pub async fn scoped_rows(
    base: &ConnectionString,
    db: &str,
    table: &str,
    max_rows: i32,
) -> Result<TableData> {
    let (db, table) = (validate_identifier(db)?, validate_identifier(table)?);
    validate_max_rows(max_rows)?;
    let mut client = connection::open(&ConnectionScope::database(base, &db)).await?;
    let data = fetch_table_data(&mut client, &table, max_rows).await?;
    connection::close(client).await;
    Ok(data)
}

fn schema_identifier() -> Result<SafeIdentifier> {
    validate_identifier(DEFAULT_SCHEMA)
}

fn first_column_strings(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get::<&str, _>(0).map(str::to_string))
        .collect()
}

fn column_meta(column: &tiberius::Column) -> ColumnMeta {
    ColumnMeta::new(column.name(), kind_of(column.column_type()))
}

/// Runtime kind of values in a result column.
pub fn kind_of(column_type: ColumnType) -> ValueKind {
    match column_type {
        ColumnType::Null => ValueKind::Null,
        ColumnType::Bit | ColumnType::Bitn => ValueKind::Boolean,
        ColumnType::Int1
        | ColumnType::Int2
        | ColumnType::Int4
        | ColumnType::Int8
        | ColumnType::Intn => ValueKind::Integer,
        ColumnType::Float4 | ColumnType::Float8 | ColumnType::Floatn => ValueKind::Float,
        ColumnType::Decimaln
        | ColumnType::Numericn
        | ColumnType::Money
        | ColumnType::Money4 => ValueKind::Decimal,
        ColumnType::Guid => ValueKind::Guid,
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Daten
        | ColumnType::Timen
        | ColumnType::Datetime2
        | ColumnType::DatetimeOffsetn => ValueKind::Timestamp,
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => ValueKind::Binary,
        _ => ValueKind::Text,
    }
}

/// Decode every cell of a row.
pub fn convert_row(row: &Row) -> Vec<SqlValue> {
    row.cells()
        .enumerate()
        .map(|(i, (col, data))| match data {
            ColumnData::F64(_) if kind_of(col.column_type()) == ValueKind::Decimal => {
                convert_money(data)
            }
            // Date/time types go through chrono
            ColumnData::DateTime(Some(_))
            | ColumnData::SmallDateTime(Some(_))
            | ColumnData::DateTime2(Some(_)) => row
                .try_get::<NaiveDateTime, _>(i)
                .ok()
                .flatten()
                .map(SqlValue::DateTime)
                .unwrap_or(SqlValue::Null),
            ColumnData::DateTimeOffset(Some(_)) => row
                .try_get::<DateTime<FixedOffset>, _>(i)
                .ok()
                .flatten()
                .map(SqlValue::DateTimeOffset)
                .unwrap_or(SqlValue::Null),
            ColumnData::Date(Some(_)) => row
                .try_get::<NaiveDate, _>(i)
                .ok()
                .flatten()
                .map(SqlValue::Date)
                .unwrap_or(SqlValue::Null),
            ColumnData::Time(Some(_)) => row
                .try_get::<NaiveTime, _>(i)
                .ok()
                .flatten()
                .map(SqlValue::Time)
                .unwrap_or(SqlValue::Null),
            _ => convert_column_data(data),
        })
        .collect()
}

/// Money cells arrive as floats; they are decimals with four places.
fn convert_money(data: &ColumnData<'_>) -> SqlValue {
    match data {
        ColumnData::F64(Some(v)) => Decimal::from_f64_retain(*v)
            .map(|d| SqlValue::Decimal(d.round_dp(MONEY_SCALE)))
            .unwrap_or(SqlValue::Float(*v)),
        other => convert_column_data(other),
    }
}

fn convert_column_data(data: &ColumnData<'_>) -> SqlValue {
    match data {
        ColumnData::Bit(Some(b)) => SqlValue::Bool(*b),
        ColumnData::U8(Some(v)) => SqlValue::Int(i64::from(*v)),
        ColumnData::I16(Some(v)) => SqlValue::Int(i64::from(*v)),
        ColumnData::I32(Some(v)) => SqlValue::Int(i64::from(*v)),
        ColumnData::I64(Some(v)) => SqlValue::Int(*v),
        ColumnData::F32(Some(v)) => SqlValue::Float(f64::from(*v)),
        ColumnData::F64(Some(v)) => SqlValue::Float(*v),
        ColumnData::Numeric(Some(n)) => {
            SqlValue::Decimal(Decimal::from_i128_with_scale(n.value(), u32::from(n.scale())))
        }
        ColumnData::String(Some(s)) => SqlValue::Text(s.to_string()),
        ColumnData::Guid(Some(g)) => SqlValue::Uuid(*g),
        ColumnData::Binary(Some(b)) => SqlValue::Bytes(b.to_vec()),
        ColumnData::Xml(Some(xml)) => SqlValue::Text(xml.to_string()),
        _ => SqlValue::Null,
    }
}

/// Boxed driver parameter for a value.
pub fn sql_value_to_sql_param(value: &SqlValue) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null => Box::new(Option::<String>::None),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::Int(i) => Box::new(*i),
        SqlValue::Float(f) => Box::new(*f),
        SqlValue::Decimal(d) => Box::new(*d),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Uuid(u) => Box::new(*u),
        SqlValue::DateTime(dt) => Box::new(*dt),
        SqlValue::DateTimeOffset(dto) => Box::new(*dto),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Time(t) => Box::new(*t),
        SqlValue::Bytes(b) => Box::new(b.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_column_types() {
        assert_eq!(kind_of(ColumnType::Intn), ValueKind::Integer);
        assert_eq!(kind_of(ColumnType::Bitn), ValueKind::Boolean);
        assert_eq!(kind_of(ColumnType::Decimaln), ValueKind::Decimal);
        assert_eq!(kind_of(ColumnType::Money), ValueKind::Decimal);
        assert_eq!(kind_of(ColumnType::Datetime2), ValueKind::Timestamp);
        assert_eq!(kind_of(ColumnType::Guid), ValueKind::Guid);
        assert_eq!(kind_of(ColumnType::BigVarBin), ValueKind::Binary);
        assert_eq!(kind_of(ColumnType::NVarchar), ValueKind::Text);
        assert_eq!(kind_of(ColumnType::Null), ValueKind::Null);
    }

    #[test]
    fn test_convert_column_data_scalars() {
        assert_eq!(convert_column_data(&ColumnData::I32(Some(7))), SqlValue::Int(7));
        assert_eq!(convert_column_data(&ColumnData::Bit(Some(true))), SqlValue::Bool(true));
        assert_eq!(convert_column_data(&ColumnData::I32(None)), SqlValue::Null);
        assert_eq!(
            convert_column_data(&ColumnData::String(Some("Ada".into()))),
            SqlValue::from("Ada")
        );
    }

    #[test]
    fn test_convert_numeric_keeps_scale() {
        let numeric = tiberius::numeric::Numeric::new_with_scale(12345, 2);
        assert_eq!(
            convert_column_data(&ColumnData::Numeric(Some(numeric))),
            SqlValue::Decimal(Decimal::new(12345, 2))
        );
    }

    #[test]
    fn test_money_cells_decode_as_decimal() {
        let value = convert_money(&ColumnData::F64(Some(12.5)));
        assert_eq!(value, SqlValue::Decimal(Decimal::new(125, 1)));
        assert_eq!(value.kind(), kind_of(ColumnType::Money));
        assert_eq!(
            convert_money(&ColumnData::F64(Some(19.99))),
            SqlValue::Decimal(Decimal::new(1999, 2))
        );
        assert_eq!(convert_money(&ColumnData::F64(None)), SqlValue::Null);
    }

    #[test]
    fn test_loaded_money_key_coerces_to_column_kind() {
        let key = convert_money(&ColumnData::F64(Some(42.75)));
        let kind = kind_of(ColumnType::Money4);
        assert_eq!(kind.coerce(key.clone()).unwrap(), key);
    }

    #[test]
    fn test_statements_bind_names_as_parameters() {
        for sql in [LIST_TABLES_SQL, COLUMN_TYPES_SQL, PRIMARY_KEY_SQL, FOREIGN_KEY_SQL] {
            assert!(sql.contains("@P1"));
        }
        assert!(!LIST_DATABASES_SQL.contains("@P"));
    }
}
