//! Provider router: forwards data-access calls to the selected backend.
//!
//! The backend is chosen per call from an [`OperationContext`], a snapshot
//! of the mode and the label of whatever triggered the call. A shared
//! [`ModeSelector`] holds the externally settable default; snapshotting it
//! into a context keeps one call on one backend even if the selector
//! changes while the call is in flight.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, Instrument};

use crate::core::schema::{ColumnTypeMap, KeyColumnSet, TableData};
use crate::core::traits::DataAccess;
use crate::drivers::mssql::{ConnectionString, RawAdminEngine};
use crate::error::{AdminError, Result};
use crate::mapping::MappedEngine;

/// Label used when the caller does not name a source.
pub const DEFAULT_SOURCE: &str = "N/A";

/// Which backend answers data-access calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hand-built statements.
    #[default]
    #[serde(alias = "sql")]
    Raw,
    /// Runtime entity models.
    #[serde(alias = "orm")]
    Mapped,
}

impl BackendKind {
    /// Provider label attached to results.
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Raw => crate::drivers::mssql::RAW_PROVIDER,
            BackendKind::Mapped => crate::mapping::MAPPED_PROVIDER,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            BackendKind::Raw => 0,
            BackendKind::Mapped => 1,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => BackendKind::Mapped,
            _ => BackendKind::Raw,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Raw => f.write_str("raw"),
            BackendKind::Mapped => f.write_str("mapped"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "sql" => Ok(BackendKind::Raw),
            "mapped" | "orm" => Ok(BackendKind::Mapped),
            other => Err(AdminError::Config(format!(
                "Unknown backend mode {:?} (expected raw, sql, mapped or orm)",
                other
            ))),
        }
    }
}

/// Shared, externally settable default backend.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ModeSelector {
    mode: Arc<AtomicU8>,
}

impl ModeSelector {
    pub fn new(mode: BackendKind) -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(mode.to_u8())),
        }
    }

    pub fn get(&self) -> BackendKind {
        BackendKind::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set(&self, mode: BackendKind) {
        debug!("Backend mode set to {}", mode);
        self.mode.store(mode.to_u8(), Ordering::Release);
    }

    /// Snapshot the current mode for one call.
    pub fn context(&self, source: impl Into<String>) -> OperationContext {
        OperationContext::new(self.get(), source)
    }
}

/// Mode and source label of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub mode: BackendKind,
    pub source: String,
}

impl OperationContext {
    pub fn new(mode: BackendKind, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            mode,
            source: if source.trim().is_empty() {
                DEFAULT_SOURCE.to_string()
            } else {
                source
            },
        }
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new(BackendKind::default(), DEFAULT_SOURCE)
    }
}

/// A result tagged with the backend that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataAccessResult<T> {
    pub provider: &'static str,
    pub source: String,
    pub data: T,
}

impl<T> DataAccessResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DataAccessResult<U> {
        DataAccessResult {
            provider: self.provider,
            source: self.source,
            data: f(self.data),
        }
    }
}

/// Routes each call to the raw or mapped backend named by its context.
///
/// No caching, retries or validation happen here.
#[derive(Debug, Clone, Default)]
pub struct ProviderRouter {
    raw: RawAdminEngine,
    mapped: MappedEngine,
}

impl ProviderRouter {
    pub fn new(raw: RawAdminEngine, mapped: MappedEngine) -> Self {
        Self { raw, mapped }
    }

    /// Raw engine, for DDL operations.
    pub fn admin(&self) -> &RawAdminEngine {
        &self.raw
    }

    /// Mapping engine, for row tracking.
    pub fn tracking(&self) -> &MappedEngine {
        &self.mapped
    }

    /// Backend for `mode`.
    pub fn backend(&self, mode: BackendKind) -> &dyn DataAccess {
        match mode {
            BackendKind::Raw => &self.raw,
            BackendKind::Mapped => &self.mapped,
        }
    }

    pub async fn list_databases(
        &self,
        ctx: &OperationContext,
        base: &ConnectionString,
    ) -> Result<DataAccessResult<Vec<String>>> {
        let backend = self.backend(ctx.mode);
        let data = backend
            .list_databases(base)
            .instrument(call_span(backend, ctx, "list_databases"))
            .await?;
        Ok(tag(backend, ctx, data))
    }

    pub async fn list_tables(
        &self,
        ctx: &OperationContext,
        base: &ConnectionString,
        db: &str,
    ) -> Result<DataAccessResult<Vec<String>>> {
        let backend = self.backend(ctx.mode);
        let data = backend
            .list_tables(base, db)
            .instrument(call_span(backend, ctx, "list_tables"))
            .await?;
        Ok(tag(backend, ctx, data))
    }

    pub async fn get_column_types(
        &self,
        ctx: &OperationContext,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<DataAccessResult<ColumnTypeMap>> {
        let backend = self.backend(ctx.mode);
        let data = backend
            .get_column_types(base, db, table)
            .instrument(call_span(backend, ctx, "get_column_types"))
            .await?;
        Ok(tag(backend, ctx, data))
    }

    pub async fn get_primary_key_columns(
        &self,
        ctx: &OperationContext,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<DataAccessResult<KeyColumnSet>> {
        let backend = self.backend(ctx.mode);
        let data = backend
            .get_primary_key_columns(base, db, table)
            .instrument(call_span(backend, ctx, "get_primary_key_columns"))
            .await?;
        Ok(tag(backend, ctx, data))
    }

    pub async fn get_foreign_key_columns(
        &self,
        ctx: &OperationContext,
        base: &ConnectionString,
        db: &str,
        table: &str,
    ) -> Result<DataAccessResult<KeyColumnSet>> {
        let backend = self.backend(ctx.mode);
        let data = backend
            .get_foreign_key_columns(base, db, table)
            .instrument(call_span(backend, ctx, "get_foreign_key_columns"))
            .await?;
        Ok(tag(backend, ctx, data))
    }

    pub async fn fetch_rows(
        &self,
        ctx: &OperationContext,
        base: &ConnectionString,
        db: &str,
        table: &str,
        max_rows: i32,
    ) -> Result<DataAccessResult<TableData>> {
        let backend = self.backend(ctx.mode);
        let data = backend
            .fetch_rows(base, db, table, max_rows)
            .instrument(call_span(backend, ctx, "fetch_rows"))
            .await?;
        Ok(tag(backend, ctx, data))
    }
}

fn call_span(backend: &dyn DataAccess, ctx: &OperationContext, operation: &'static str) -> tracing::Span {
    info_span!(
        "data_access",
        provider = backend.provider_name(),
        source = %ctx.source,
        operation
    )
}

fn tag<T>(backend: &dyn DataAccess, ctx: &OperationContext, data: T) -> DataAccessResult<T> {
    DataAccessResult {
        provider: backend.provider_name(),
        source: ctx.source.clone(),
        data,
    }
}
