//! Identifier and data type guard for statement construction.
//!
//! SQL identifiers (database, table and column names) and declared column
//! types cannot be passed as parameters in prepared statements - only data
//! values can be parameterized. Every name and every type that ends up inside
//! DDL or a `FROM` clause therefore goes through this module first:
//!
//! 1. Names must match `[A-Za-z0-9_]+` ([`validate_identifier`]).
//! 2. Declared types must be members of a closed allow-list
//!    ([`validate_data_type`]).
//!
//! Values produced here are the only inputs the statement builders accept,
//! so an unchecked string cannot reach a statement by construction.

use std::fmt;

use crate::error::{AdminError, Result};

/// Maximum identifier length accepted by SQL Server (`sysname`).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Suffix appended to key columns in row detail displays.
pub const PRIMARY_KEY_DISPLAY_SUFFIX: &str = " [PK]";

/// Declared column types accepted by column DDL.
///
/// Spellings are canonical lower-case; input is matched case-insensitively.
pub const ALLOWED_DATA_TYPES: &[&str] = &[
    "int",
    "bigint",
    "smallint",
    "tinyint",
    "bit",
    "decimal(18,2)",
    "decimal(18,4)",
    "numeric(18,2)",
    "float",
    "real",
    "money",
    "date",
    "datetime",
    "datetime2",
    "time",
    "datetimeoffset",
    "uniqueidentifier",
    "nvarchar(50)",
    "nvarchar(100)",
    "nvarchar(255)",
    "nvarchar(max)",
    "varchar(50)",
    "varchar(255)",
    "varchar(max)",
    "nchar(10)",
    "char(10)",
    "varbinary(255)",
    "varbinary(max)",
];

/// A database, table or column name that passed [`validate_identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SafeIdentifier(String);

impl SafeIdentifier {
    /// The validated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bracket-quoted form for interpolation into T-SQL.
    pub fn quoted(&self) -> String {
        // Brackets cannot occur in a validated name, no escaping needed.
        format!("[{}]", self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SafeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A declared column type drawn from [`ALLOWED_DATA_TYPES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllowedDataType(&'static str);

impl AllowedDataType {
    /// Canonical spelling, safe to interpolate into column DDL.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for AllowedDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Validate a database, table or column name.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - Any character outside `[A-Za-z0-9_]`
/// - Names longer than SQL Server's 128 character limit
///
/// # Errors
///
/// Returns `AdminError::Validation` with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<SafeIdentifier> {
    if name.trim().is_empty() {
        return Err(AdminError::validation("Name must not be empty"));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(AdminError::Validation(format!(
            "Only letters, digits and underscore are allowed in names (found {:?} in {:?})",
            bad, name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(AdminError::Validation(format!(
            "Name exceeds maximum length of {} characters (got {})",
            MAX_IDENTIFIER_LENGTH,
            name.len()
        )));
    }

    Ok(SafeIdentifier(name.to_string()))
}

/// Validate a declared column type against the allow-list.
///
/// Surrounding whitespace is ignored and matching is case-insensitive;
/// the returned value carries the canonical spelling.
pub fn validate_data_type(text: &str) -> Result<AllowedDataType> {
    let trimmed = text.trim();
    ALLOWED_DATA_TYPES
        .iter()
        .find(|allowed| allowed.eq_ignore_ascii_case(trimmed))
        .map(|allowed| AllowedDataType(*allowed))
        .ok_or_else(|| {
            AdminError::Validation(format!(
                "Data type {:?} is not allowed. Allowed types: {}",
                trimmed,
                ALLOWED_DATA_TYPES.join(", ")
            ))
        })
}

/// Qualify a table with a schema, both bracket-quoted.
pub fn qualify(schema: &SafeIdentifier, table: &SafeIdentifier) -> String {
    format!("{}.{}", schema.quoted(), table.quoted())
}

/// Display name of a column in row details (`Id [PK]` for key columns).
pub fn column_display_name(column: &str, is_primary_key: bool) -> String {
    if is_primary_key {
        format!("{}{}", column, PRIMARY_KEY_DISPLAY_SUFFIX)
    } else {
        column.to_string()
    }
}

/// Recover the column name from its row-detail display text.
///
/// Accepts `Name` and `Name [PK]`. Anything else - empty text, stray
/// brackets, a different marker - is malformed.
pub fn column_from_display(text: &str) -> Result<SafeIdentifier> {
    let trimmed = text.trim();
    let name = trimmed
        .strip_suffix(PRIMARY_KEY_DISPLAY_SUFFIX)
        .unwrap_or(trimmed);

    if name.contains('[') || name.contains(']') {
        return Err(AdminError::Validation(format!(
            "Malformed column display text: {:?}",
            text
        )));
    }

    validate_identifier(name).map_err(|_| {
        AdminError::Validation(format!("Malformed column display text: {:?}", text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Identifier tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("my_table").is_ok());
        assert!(validate_identifier("Table123").is_ok());
        assert!(validate_identifier("_").is_ok());
        assert_eq!(validate_identifier("TestDb1").unwrap().as_str(), "TestDb1");
    }

    #[test]
    fn test_validate_identifier_rejects_empty_and_whitespace() {
        for name in ["", " ", "\t", "   \n"] {
            let err = validate_identifier(name).unwrap_err();
            assert!(matches!(err, AdminError::Validation(_)), "{:?}", name);
            assert!(err.to_string().contains("empty"));
        }
    }

    #[test]
    fn test_validate_identifier_rejects_outside_charset() {
        let bad = [
            "column with spaces",
            "my-table",
            "Robert'); DROP TABLE Students;--",
            "table]name",
            "a.b",
            "name\0",
            "日本語",
            " padded",
            "ümlaut",
        ];
        for name in bad {
            let err = validate_identifier(name).unwrap_err();
            assert!(matches!(err, AdminError::Validation(_)), "{:?}", name);
        }
    }

    #[test]
    fn test_validate_identifier_length() {
        let max_name = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&max_name).is_ok());

        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let err = validate_identifier(&long_name).unwrap_err();
        assert!(err.to_string().contains("maximum length"));
    }

    #[test]
    fn test_quoted_and_qualify() {
        let schema = validate_identifier("dbo").unwrap();
        let table = validate_identifier("users").unwrap();
        assert_eq!(table.quoted(), "[users]");
        assert_eq!(qualify(&schema, &table), "[dbo].[users]");
    }

    // =========================================================================
    // Data type tests
    // =========================================================================

    #[test]
    fn test_validate_data_type_case_insensitive_and_trimmed() {
        assert_eq!(validate_data_type("int").unwrap().as_str(), "int");
        assert_eq!(validate_data_type("  INT ").unwrap().as_str(), "int");
        assert_eq!(
            validate_data_type("NVarChar(50)").unwrap().as_str(),
            "nvarchar(50)"
        );
        assert_eq!(validate_data_type("nvarchar(MAX)").unwrap().as_str(), "nvarchar(max)");
    }

    #[test]
    fn test_validate_data_type_rejects_unlisted() {
        let bad = [
            "",
            "nvarchar",
            "nvarchar(51)",
            "nvarchar (50)",
            "int; DROP TABLE x",
            "int NOT NULL",
            "geography",
            "text",
        ];
        for text in bad {
            let err = validate_data_type(text).unwrap_err();
            assert!(matches!(err, AdminError::Validation(_)), "{:?}", text);
        }
    }

    #[test]
    fn test_allow_list_contains_original_types() {
        for t in ["int", "bit", "datetime", "nvarchar(50)", "nvarchar(100)"] {
            assert!(ALLOWED_DATA_TYPES.contains(&t));
        }
    }

    // =========================================================================
    // Column display tests
    // =========================================================================

    #[test]
    fn test_column_display_round_trip() {
        assert_eq!(column_display_name("Id", true), "Id [PK]");
        assert_eq!(column_display_name("Name", false), "Name");
        assert_eq!(column_from_display("Id [PK]").unwrap().as_str(), "Id");
        assert_eq!(column_from_display("Name").unwrap().as_str(), "Name");
    }

    #[test]
    fn test_column_from_display_rejects_malformed() {
        for text in ["", " [PK]", "Id [FK]", "Id[PK]", "[PK] Id", "Id [PK] [PK]"] {
            let err = column_from_display(text).unwrap_err();
            assert!(matches!(err, AdminError::Validation(_)), "{:?}", text);
        }
    }
}
