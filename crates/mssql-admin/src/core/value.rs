//! Tagged SQL values for rows of tables whose shape is only known at runtime.
//!
//! A loaded row is a list of [`SqlValue`]s; each column additionally carries a
//! [`ValueKind`], the small closed set of runtime kinds used to describe and
//! cache row mappings without any compile-time knowledge of the table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AdminError, Result};

/// Runtime kind of a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Guid,
    Timestamp,
    Binary,
    Null,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Decimal => "decimal",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "text",
            ValueKind::Guid => "guid",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Binary => "binary",
            ValueKind::Null => "null",
        }
    }

    /// Convert a value to this kind.
    ///
    /// Primary key values usually arrive as display text; they are parsed
    /// into the kind recorded for the key column before the lookup is bound.
    /// Values that already have the right kind pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` if the value cannot represent this kind.
    pub fn coerce(&self, value: SqlValue) -> Result<SqlValue> {
        if value.kind() == *self || *self == ValueKind::Null {
            return Ok(value);
        }

        let fail = |value: &SqlValue| {
            AdminError::Validation(format!(
                "Cannot convert {} value {:?} to {}",
                value.kind().as_str(),
                value.to_string(),
                self.as_str()
            ))
        };

        match (self, &value) {
            (_, SqlValue::Null) => Ok(SqlValue::Null),
            (ValueKind::Text, _) => Ok(SqlValue::Text(value.to_string())),
            (ValueKind::Integer, SqlValue::Text(s)) => {
                s.trim().parse::<i64>().map(SqlValue::Int).map_err(|_| fail(&value))
            }
            (ValueKind::Integer, SqlValue::Bool(b)) => Ok(SqlValue::Int(i64::from(*b))),
            (ValueKind::Integer, SqlValue::Decimal(d)) if d.fract().is_zero() => {
                i64::try_from(*d).map(SqlValue::Int).map_err(|_| fail(&value))
            }
            (ValueKind::Float, SqlValue::Text(s)) => {
                s.trim().parse::<f64>().map(SqlValue::Float).map_err(|_| fail(&value))
            }
            (ValueKind::Float, SqlValue::Int(i)) => Ok(SqlValue::Float(*i as f64)),
            (ValueKind::Decimal, SqlValue::Text(s)) => Decimal::from_str(s.trim())
                .map(SqlValue::Decimal)
                .map_err(|_| fail(&value)),
            (ValueKind::Decimal, SqlValue::Int(i)) => Ok(SqlValue::Decimal(Decimal::from(*i))),
            (ValueKind::Decimal, SqlValue::Float(f)) => Decimal::from_f64_retain(*f)
                .map(SqlValue::Decimal)
                .ok_or_else(|| fail(&value)),
            (ValueKind::Boolean, SqlValue::Text(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(SqlValue::Bool(true)),
                "false" | "0" => Ok(SqlValue::Bool(false)),
                _ => Err(fail(&value)),
            },
            (ValueKind::Boolean, SqlValue::Int(i)) => Ok(SqlValue::Bool(*i != 0)),
            (ValueKind::Guid, SqlValue::Text(s)) => Uuid::parse_str(s.trim())
                .map(SqlValue::Uuid)
                .map_err(|_| fail(&value)),
            (ValueKind::Timestamp, SqlValue::Text(s)) => {
                parse_timestamp(s.trim()).ok_or_else(|| fail(&value))
            }
            _ => Err(fail(&value)),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// NULL of any column type.
    Null,

    /// Boolean value (bit).
    Bool(bool),

    /// Any integer column (tinyint through bigint).
    Int(i64),

    /// Floating point (real/float).
    Float(f64),

    /// Exact numeric (decimal/numeric/money).
    Decimal(Decimal),

    /// Character data.
    Text(String),

    /// uniqueidentifier.
    Uuid(Uuid),

    /// datetime/datetime2/smalldatetime.
    DateTime(NaiveDateTime),

    /// datetimeoffset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// date.
    Date(NaiveDate),

    /// time.
    Time(NaiveTime),

    /// binary/varbinary/image.
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Runtime kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            SqlValue::Null => ValueKind::Null,
            SqlValue::Bool(_) => ValueKind::Boolean,
            SqlValue::Int(_) => ValueKind::Integer,
            SqlValue::Float(_) => ValueKind::Float,
            SqlValue::Decimal(_) => ValueKind::Decimal,
            SqlValue::Text(_) => ValueKind::Text,
            SqlValue::Uuid(_) => ValueKind::Guid,
            SqlValue::DateTime(_)
            | SqlValue::DateTimeOffset(_)
            | SqlValue::Date(_)
            | SqlValue::Time(_) => ValueKind::Timestamp,
            SqlValue::Bytes(_) => ValueKind::Binary,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// A plausible edited value for demonstrating change tracking.
    ///
    /// Integers are incremented, text gets a `_demo` suffix and timestamps
    /// move forward one second. Anything else becomes the text `DemoValue`.
    #[must_use]
    pub fn demo_value(&self) -> SqlValue {
        match self {
            SqlValue::Int(i) => SqlValue::Int(i.wrapping_add(1)),
            SqlValue::Text(s) => SqlValue::Text(format!("{}_demo", s)),
            SqlValue::DateTime(dt) => SqlValue::DateTime(*dt + Duration::seconds(1)),
            SqlValue::DateTimeOffset(dt) => SqlValue::DateTimeOffset(*dt + Duration::seconds(1)),
            _ => SqlValue::Text("DemoValue".to_string()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => f.write_str(v),
            SqlValue::Uuid(v) => write!(f, "{}", v),
            SqlValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            SqlValue::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            SqlValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            SqlValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            SqlValue::Bytes(v) => {
                f.write_str("0x")?;
                for b in v {
                    write!(f, "{:02X}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// Parse display text of a date/time column.
fn parse_timestamp(s: &str) -> Option<SqlValue> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(SqlValue::DateTimeOffset(dt));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(SqlValue::DateTime(dt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(SqlValue::Date(d));
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .ok()
        .map(SqlValue::Time)
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
