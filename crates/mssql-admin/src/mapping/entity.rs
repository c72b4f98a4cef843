//! In-memory tracked row with change flags.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::value::SqlValue;
use crate::error::{AdminError, Result};

use super::model::EntityModel;

/// Change state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityState {
    Unchanged,
    Modified,
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityState::Unchanged => f.write_str("Unchanged"),
            EntityState::Modified => f.write_str("Modified"),
        }
    }
}

/// State tag plus the columns that differ from the loaded row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingSnapshot {
    pub state: EntityState,
    /// Modified columns in field order.
    pub modified_columns: Vec<String>,
}

impl TrackingSnapshot {
    /// Status line such as `Tracking State: Modified (Modified: Name, Price)`.
    pub fn state_text(&self) -> String {
        if self.modified_columns.is_empty() {
            format!("Tracking State: {}", self.state)
        } else {
            format!(
                "Tracking State: {} (Modified: {})",
                self.state,
                self.modified_columns.join(", ")
            )
        }
    }
}

/// One loaded row, editable in memory.
///
/// Setting a value marks its field modified even when the new value equals
/// the old one; only [`TrackedEntity::revert`] clears flags.
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    model: Arc<EntityModel>,
    original: Vec<SqlValue>,
    current: Vec<SqlValue>,
    modified: Vec<bool>,
    state: EntityState,
}

impl TrackedEntity {
    /// Wrap values loaded in the model's field order.
    pub fn new(model: Arc<EntityModel>, values: Vec<SqlValue>) -> Result<Self> {
        if values.len() != model.field_count() {
            return Err(AdminError::Validation(format!(
                "Expected {} values for {}, got {}",
                model.field_count(),
                model.entity_name(),
                values.len()
            )));
        }

        Ok(Self {
            modified: vec![false; values.len()],
            original: values.clone(),
            current: values,
            state: EntityState::Unchanged,
            model,
        })
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Current value of `column`.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.model.field_index(column).map(|i| &self.current[i])
    }

    /// Value of `column` as originally loaded.
    pub fn original_value(&self, column: &str) -> Option<&SqlValue> {
        self.model.field_index(column).map(|i| &self.original[i])
    }

    /// Current `(column, value)` pairs in field order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.model
            .columns()
            .iter()
            .map(|c| c.as_str())
            .zip(self.current.iter())
    }

    /// Record a new value for `column` and flag it modified.
    ///
    /// # Errors
    ///
    /// `AdminError::Validation` if `column` is not a field of this entity.
    pub fn set_value(&mut self, column: &str, value: SqlValue) -> Result<()> {
        let index = self.model.field_index(column).ok_or_else(|| {
            AdminError::Validation(format!(
                "Column {:?} is not part of {}",
                column,
                self.model.entity_name()
            ))
        })?;

        self.current[index] = value;
        self.modified[index] = true;
        self.state = EntityState::Modified;
        Ok(())
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        let modified_columns = self
            .model
            .columns()
            .iter()
            .zip(&self.modified)
            .filter(|(_, m)| **m)
            .map(|(c, _)| c.as_str().to_string())
            .collect();

        TrackingSnapshot {
            state: self.state,
            modified_columns,
        }
    }

    /// Restore every loaded value and clear all change flags.
    pub fn revert(&mut self) {
        self.current.clone_from(&self.original);
        self.modified.iter_mut().for_each(|m| *m = false);
        self.state = EntityState::Unchanged;
    }
}
