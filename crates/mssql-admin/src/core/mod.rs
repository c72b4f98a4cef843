//! Backend-independent building blocks.
//!
//! - [`identifier`]: name and declared-type guard for statement construction
//! - [`value`]: owned SQL values and their runtime kinds
//! - [`schema`]: column descriptors, key sets and tabular results
//! - [`traits`]: the [`DataAccess`] contract both backends implement

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use identifier::{
    column_display_name, column_from_display, validate_data_type, validate_identifier,
    AllowedDataType, SafeIdentifier, ALLOWED_DATA_TYPES,
};
pub use schema::{ColumnDescriptor, ColumnMeta, ColumnTypeMap, FieldSpec, KeyColumnSet, TableData};
pub use traits::DataAccess;
pub use value::{SqlValue, ValueKind};
