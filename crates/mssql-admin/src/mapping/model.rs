//! Runtime entity models for tables whose shape is only known from data.
//!
//! A [`TrackingModelDescriptor`] describes one table as seen in a loaded
//! result set. Its [`SchemaSignature`] (entity name, table, key column and
//! the sorted column/kind pairs) is the cache key for the compiled
//! [`EntityModel`]: equal signatures share one model, any difference in
//! table, columns or kinds compiles a separate one. The model itself keeps
//! the columns in the descriptor's physical order.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::core::identifier::{validate_identifier, SafeIdentifier};
use crate::core::schema::FieldSpec;
use crate::core::value::ValueKind;
use crate::error::{AdminError, Result};

/// Prefix of synthesized entity names.
const ENTITY_NAME_PREFIX: &str = "TrackedRow";

/// Entity name for a row of `table` in `db`.
///
/// Characters outside `[A-Za-z0-9_]` become `_`.
pub fn entity_name(db: &str, table: &str) -> String {
    fn sanitize(s: &str) -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }
    format!("{}_{}_{}", ENTITY_NAME_PREFIX, sanitize(db), sanitize(table))
}

/// Shape of a table as observed in a loaded result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingModelDescriptor {
    pub entity_name: String,
    pub table_name: String,
    pub primary_key_column: String,
    pub fields: Vec<FieldSpec>,
}

impl TrackingModelDescriptor {
    /// Descriptor for `table` in `db` with the given key and fields.
    pub fn new(db: &str, table: &str, primary_key_column: &str, fields: &[FieldSpec]) -> Self {
        Self {
            entity_name: entity_name(db, table),
            table_name: table.to_string(),
            primary_key_column: primary_key_column.to_string(),
            fields: fields.to_vec(),
        }
    }

    /// Order-independent cache key.
    pub fn signature(&self) -> SchemaSignature {
        let mut fields: Vec<(String, ValueKind)> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.kind))
            .collect();
        fields.sort();

        SchemaSignature {
            entity_name: self.entity_name.clone(),
            table_name: self.table_name.clone(),
            primary_key_column: self.primary_key_column.clone(),
            fields,
        }
    }
}

/// Composite key partitioning the model cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaSignature {
    entity_name: String,
    table_name: String,
    primary_key_column: String,
    /// Sorted by column name.
    fields: Vec<(String, ValueKind)>,
}

impl fmt::Display for SchemaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}; key {}; ",
            self.entity_name, self.table_name, self.primary_key_column
        )?;
        for (i, (name, kind)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", name, kind)?;
        }
        f.write_str(")")
    }
}

/// Compiled mapping for one schema signature.
#[derive(Debug)]
pub struct EntityModel {
    entity_name: String,
    table: SafeIdentifier,
    columns: Vec<SafeIdentifier>,
    kinds: Vec<ValueKind>,
    key_index: usize,
}

impl EntityModel {
    /// Validate and freeze a descriptor into a model, keeping its field order.
    ///
    /// Fails when a name is not a safe identifier, a column appears twice,
    /// or the key column is not one of the fields.
    pub fn compile(descriptor: &TrackingModelDescriptor) -> Result<Self> {
        let table = validate_identifier(&descriptor.table_name)?;
        if descriptor.fields.is_empty() {
            return Err(AdminError::Validation(format!(
                "Cannot track rows of {} without columns",
                table
            )));
        }

        let mut columns = Vec::with_capacity(descriptor.fields.len());
        let mut kinds = Vec::with_capacity(descriptor.fields.len());
        for field in &descriptor.fields {
            let column = validate_identifier(&field.name)?;
            if columns
                .iter()
                .any(|c: &SafeIdentifier| c.as_str().eq_ignore_ascii_case(column.as_str()))
            {
                return Err(AdminError::Validation(format!(
                    "Column {} appears more than once in {}",
                    column, table
                )));
            }
            columns.push(column);
            kinds.push(field.kind);
        }

        let key_index = columns
            .iter()
            .position(|c| c.as_str().eq_ignore_ascii_case(&descriptor.primary_key_column))
            .ok_or_else(|| {
                AdminError::Validation(format!(
                    "Key column {} is not among the columns of {}",
                    descriptor.primary_key_column, table
                ))
            })?;

        Ok(Self {
            entity_name: descriptor.entity_name.clone(),
            table,
            columns,
            kinds,
            key_index,
        })
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn table(&self) -> &SafeIdentifier {
        &self.table
    }

    /// Mapped columns in physical order.
    pub fn columns(&self) -> &[SafeIdentifier] {
        &self.columns
    }

    pub fn kind(&self, index: usize) -> Option<ValueKind> {
        self.kinds.get(index).copied()
    }

    /// Field index of `name`, ignoring ASCII case.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.as_str().eq_ignore_ascii_case(name))
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn key_column(&self) -> &SafeIdentifier {
        &self.columns[self.key_index]
    }

    pub fn key_kind(&self) -> ValueKind {
        self.kinds[self.key_index]
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }
}

/// Concurrent cache of compiled models keyed by [`SchemaSignature`].
///
/// Lookups take a shard read lock only; compilation happens under the
/// entry's write lock so each signature compiles once.
#[derive(Default)]
pub struct ModelCache {
    models: DashMap<SchemaSignature, Arc<EntityModel>>,

    /// Lookups answered from the cache.
    hits: AtomicU64,

    /// Models compiled.
    compilations: AtomicU64,
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("models", &self.models.len())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("compilations", &self.compilations.load(Ordering::Relaxed))
            .finish()
    }
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model for `descriptor`, compiling it on first use.
    ///
    /// A reused model keeps the field order of the descriptor that compiled it.
    pub fn get_or_compile(&self, descriptor: &TrackingModelDescriptor) -> Result<Arc<EntityModel>> {
        let signature = descriptor.signature();

        if let Some(model) = self.models.get(&signature) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(model.value()));
        }

        match self.models.entry(signature) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let model = Arc::new(EntityModel::compile(descriptor)?);
                debug!("Compiled entity model {}", entry.key());
                self.compilations.fetch_add(1, Ordering::Relaxed);
                entry.insert(Arc::clone(&model));
                Ok(model)
            }
        }
    }

    /// Number of distinct models held.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("Id", ValueKind::Integer),
            FieldSpec::new("Name", ValueKind::Text),
            FieldSpec::new("Created", ValueKind::Timestamp),
        ]
    }

    #[test]
    fn test_entity_name_sanitizes() {
        assert_eq!(entity_name("TestDb1", "T1"), "TrackedRow_TestDb1_T1");
        assert_eq!(entity_name("my-db", "a b.c"), "TrackedRow_my_db_a_b_c");
    }

    #[test]
    fn test_signature_ignores_field_order() {
        let a = TrackingModelDescriptor::new("Db", "T1", "Id", &fields());
        let mut reversed = fields();
        reversed.reverse();
        let b = TrackingModelDescriptor::new("Db", "T1", "Id", &reversed);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_model_keeps_physical_column_order() {
        let cache = ModelCache::new();
        let physical = vec![
            FieldSpec::new("Id", ValueKind::Integer),
            FieldSpec::new("zeta", ValueKind::Text),
            FieldSpec::new("Alpha", ValueKind::Text),
        ];
        let descriptor = TrackingModelDescriptor::new("Db", "T1", "Id", &physical);
        let model = cache.get_or_compile(&descriptor).unwrap();

        assert_eq!(
            model.columns().iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            vec!["Id", "zeta", "Alpha"]
        );
        assert_eq!(model.key_index(), 0);

        // The cache key stays order-independent
        let mut shuffled = physical.clone();
        shuffled.rotate_left(1);
        let reused = cache
            .get_or_compile(&TrackingModelDescriptor::new("Db", "T1", "Id", &shuffled))
            .unwrap();
        assert!(Arc::ptr_eq(&model, &reused));
    }

    #[test]
    fn test_same_signature_reuses_model() {
        let cache = ModelCache::new();
        let descriptor = TrackingModelDescriptor::new("Db", "T1", "Id", &fields());

        let first = cache.get_or_compile(&descriptor).unwrap();
        let second = cache.get_or_compile(&descriptor.clone()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.compilations(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_different_table_gets_separate_model() {
        let cache = ModelCache::new();
        let t1 = TrackingModelDescriptor::new("Db", "T1", "Id", &fields());
        let t1_model = cache.get_or_compile(&t1).unwrap();

        // Same fields and entity name, only the physical table differs
        let mut t2 = t1.clone();
        t2.table_name = "T2".to_string();
        t2.fields = vec![
            FieldSpec::new("Id", ValueKind::Integer),
            FieldSpec::new("Price", ValueKind::Decimal),
        ];
        let t2_model = cache.get_or_compile(&t2).unwrap();

        assert!(!Arc::ptr_eq(&t1_model, &t2_model));
        assert_eq!(t2_model.table().as_str(), "T2");
        assert!(t2_model.field_index("Name").is_none());
        assert!(t2_model.field_index("Created").is_none());
        assert_eq!(
            t2_model.columns().iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            vec!["Id", "Price"]
        );
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_table_name_alone_partitions_cache() {
        let cache = ModelCache::new();
        let t1 = TrackingModelDescriptor::new("Db", "T1", "Id", &fields());
        let mut t2 = t1.clone();
        t2.table_name = "T2".to_string();

        let a = cache.get_or_compile(&t1).unwrap();
        let b = cache.get_or_compile(&t2).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.table().as_str(), "T1");
        assert_eq!(b.table().as_str(), "T2");
    }

    #[test]
    fn test_kind_change_gets_separate_model() {
        let cache = ModelCache::new();
        let a = TrackingModelDescriptor::new("Db", "T1", "Id", &fields());
        let mut b = a.clone();
        b.fields[1] = FieldSpec::new("Name", ValueKind::Binary);

        let model_a = cache.get_or_compile(&a).unwrap();
        let model_b = cache.get_or_compile(&b).unwrap();
        assert!(!Arc::ptr_eq(&model_a, &model_b));
        assert_eq!(model_b.kind(model_b.field_index("Name").unwrap()), Some(ValueKind::Binary));
    }

    #[test]
    fn test_key_column_change_gets_separate_model() {
        let cache = ModelCache::new();
        let a = TrackingModelDescriptor::new("Db", "T1", "Id", &fields());
        let b = TrackingModelDescriptor::new("Db", "T1", "Name", &fields());

        let model_a = cache.get_or_compile(&a).unwrap();
        let model_b = cache.get_or_compile(&b).unwrap();
        assert!(!Arc::ptr_eq(&model_a, &model_b));
        assert_eq!(model_b.key_column().as_str(), "Name");
        assert_eq!(model_b.key_kind(), ValueKind::Text);
    }

    #[test]
    fn test_compile_rejects_bad_descriptors() {
        let cache = ModelCache::new();

        let missing_key = TrackingModelDescriptor::new("Db", "T1", "Nope", &fields());
        assert!(matches!(
            cache.get_or_compile(&missing_key),
            Err(AdminError::Validation(_))
        ));

        let bad_column = TrackingModelDescriptor::new(
            "Db",
            "T1",
            "Id",
            &[FieldSpec::new("Id", ValueKind::Integer), FieldSpec::new("x;y", ValueKind::Text)],
        );
        assert!(cache.get_or_compile(&bad_column).is_err());

        let duplicate = TrackingModelDescriptor::new(
            "Db",
            "T1",
            "Id",
            &[FieldSpec::new("Id", ValueKind::Integer), FieldSpec::new("ID", ValueKind::Integer)],
        );
        assert!(cache.get_or_compile(&duplicate).is_err());

        // Failed compilations are not cached
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_lookups_share_one_model() {
        let cache = Arc::new(ModelCache::new());
        let descriptor = TrackingModelDescriptor::new("Db", "T1", "Id", &fields());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let descriptor = descriptor.clone();
                std::thread::spawn(move || cache.get_or_compile(&descriptor).unwrap())
            })
            .collect();

        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.compilations(), 1);
    }
}
