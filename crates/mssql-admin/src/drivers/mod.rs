//! Database driver implementations.
//!
//! Only SQL Server is supported. Driver code owns everything that touches
//! the wire: connection scopes, statement text and row decoding.

pub mod mssql;

pub use mssql::{ConnectionScope, ConnectionString, RawAdminEngine};
