use std::collections::BTreeMap;

use async_trait::async_trait;
use opsgate_core::AppResult;
use opsgate_domain::{EntityKind, RecordFilters, RecordSnapshot};
use serde_json::Value;

/// One mutation applied against the domain store as a single atomic unit.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainMutation {
    /// Insert one record from field values.
    Insert {
        /// Field values of the new record.
        values: BTreeMap<String, Value>,
    },
    /// Apply field values to every record matching the filters.
    Update {
        /// Record selection.
        filters: RecordFilters,
        /// Field values to apply.
        values: BTreeMap<String, Value>,
    },
    /// Remove every record matching the filters.
    Delete {
        /// Record selection.
        filters: RecordFilters,
    },
    /// Reinstate records to their captured state, inserting missing ones.
    /// Used to reverse UPDATE and DELETE executions.
    Restore {
        /// Snapshots to reinstate, keyed by their record ids.
        snapshots: Vec<RecordSnapshot>,
    },
    /// Remove records by id. Used to reverse CREATE executions.
    DeleteByKey {
        /// Ids of the records to remove.
        record_ids: Vec<String>,
    },
}

/// Read/write gateway to the institutional record store.
///
/// The store's own transaction boundary is relied upon for atomicity: a
/// `mutate` call either applies fully or not at all, and returns the
/// post-mutation state of every touched record (for removals, the records as
/// they were at removal). Results are ordered by record id so callers can
/// align snapshots taken before and after a mutation.
#[async_trait]
pub trait DomainDataGateway: Send + Sync {
    /// Returns records matching the filters, ordered by record id.
    async fn query(
        &self,
        entity: EntityKind,
        filters: &RecordFilters,
        limit: Option<usize>,
    ) -> AppResult<Vec<RecordSnapshot>>;

    /// Returns the full count of records matching the filters.
    async fn count(&self, entity: EntityKind, filters: &RecordFilters) -> AppResult<u64>;

    /// Applies one mutation as a single atomic unit.
    async fn mutate(
        &self,
        entity: EntityKind,
        mutation: DomainMutation,
    ) -> AppResult<Vec<RecordSnapshot>>;
}
