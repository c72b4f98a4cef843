//! Live tracking session: one connection plus one tracked row.

use tracing::debug;

use crate::core::value::SqlValue;
use crate::drivers::mssql::connection::{self, MssqlClient};
use crate::error::Result;

use super::entity::{EntityState, TrackedEntity, TrackingSnapshot};

/// Holds the connection that loaded a row for as long as the row is tracked.
///
/// Nothing is written back to the server. Call [`RowTrackingSession::dispose`]
/// when another row is selected or the table is reloaded; dropping the
/// session also closes the socket, without the graceful shutdown.
pub struct RowTrackingSession {
    client: MssqlClient,
    entity: TrackedEntity,
}

impl RowTrackingSession {
    pub(crate) fn new(client: MssqlClient, entity: TrackedEntity) -> Self {
        debug!(
            "Tracking session opened for {}",
            entity.model().entity_name()
        );
        Self { client, entity }
    }

    pub fn entity(&self) -> &TrackedEntity {
        &self.entity
    }

    pub fn state(&self) -> EntityState {
        self.entity.state()
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entity.get(column)
    }

    /// See [`TrackedEntity::set_value`].
    pub fn set_value(&mut self, column: &str, value: SqlValue) -> Result<()> {
        self.entity.set_value(column, value)
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.entity.snapshot()
    }

    pub fn revert(&mut self) {
        self.entity.revert();
    }

    /// Release the connection. Consumes the session.
    pub async fn dispose(self) {
        debug!(
            "Tracking session closed for {}",
            self.entity.model().entity_name()
        );
        connection::close(self.client).await;
    }
}

impl std::fmt::Debug for RowTrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowTrackingSession")
            .field("entity", &self.entity.model().entity_name())
            .field("state", &self.entity.state())
            .finish()
    }
}
