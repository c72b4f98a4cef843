//! Schema metadata and tabular results returned by the data-access backends.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::value::{SqlValue, ValueKind};

/// Name and canonical declared type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Canonical type string, e.g. `nvarchar(50)` or `decimal(18,2)`.
    pub data_type: String,
}

/// Column types of a table, kept in physical column order.
///
/// Lookup by name is case-insensitive, matching SQL Server's default
/// collation for identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnTypeMap {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnTypeMap {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    /// Canonical type of a column.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.data_type.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Columns in physical order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Set of column names forming a key (primary or foreign side).
///
/// Membership tests ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyColumnSet {
    columns: BTreeSet<String>,
}

impl KeyColumnSet {
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.columns.insert(name);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KeyColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = KeyColumnSet::default();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

/// A column name paired with the runtime kind of its values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: ValueKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Result column metadata.
pub type ColumnMeta = FieldSpec;

/// Rows fetched from a table, with column metadata from the result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl TableData {
    /// Column name/kind pairs, the input for starting row tracking.
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        self.columns.clone()
    }

    /// Index of a column by name (case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Value of `column` in row `row`.
    pub fn value(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_map_keeps_order_and_ignores_case() {
        let map = ColumnTypeMap::new(vec![
            ColumnDescriptor {
                name: "Id".to_string(),
                data_type: "int".to_string(),
            },
            ColumnDescriptor {
                name: "Name".to_string(),
                data_type: "nvarchar(50)".to_string(),
            },
        ]);

        assert_eq!(map.get("name"), Some("nvarchar(50)"));
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["Id", "Name"]);
        assert!(!map.contains("Missing"));
    }

    #[test]
    fn test_key_column_set_dedupes_case_insensitively() {
        let set: KeyColumnSet = ["Id", "ID", "TenantId"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("id"));
        assert!(set.contains("tenantid"));
    }

    #[test]
    fn test_table_data_lookup() {
        let data = TableData {
            columns: vec![
                FieldSpec::new("Id", ValueKind::Integer),
                FieldSpec::new("Name", ValueKind::Text),
            ],
            rows: vec![vec![SqlValue::Int(1), SqlValue::from("Ada")]],
        };

        assert_eq!(data.value(0, "name"), Some(&SqlValue::from("Ada")));
        assert_eq!(data.value(1, "Name"), None);
        assert_eq!(data.field_specs().len(), 2);
    }
}
