use std::collections::BTreeMap;

use async_trait::async_trait;
use opsgate_application::{DomainDataGateway, DomainMutation};
use opsgate_core::{AppError, AppResult};
use opsgate_domain::{EntityKind, RecordFilters, RecordSnapshot};
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct GatewayState {
    records: BTreeMap<(EntityKind, u64), Value>,
    next_id: u64,
}

/// In-memory institutional record store.
///
/// Stands in for the external domain data collaborator in tests and
/// single-process deployments. Every mutation runs under one write lock and
/// is applied all-or-nothing, mirroring the transaction boundary a real
/// store provides.
#[derive(Debug, Default)]
pub struct InMemoryDomainGateway {
    state: RwLock<GatewayState>,
}

impl InMemoryDomainGateway {
    /// Creates an empty in-memory record store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GatewayState::default()),
        }
    }

    /// Inserts seed records for an entity, assigning sequential ids.
    pub async fn seed_records(&self, entity: EntityKind, rows: Vec<Value>) {
        let mut state = self.state.write().await;
        for row in rows {
            state.next_id += 1;
            let id = state.next_id;
            state.records.insert((entity, id), row);
        }
    }

    /// Returns one raw record for test assertions.
    pub async fn record(&self, entity: EntityKind, id: u64) -> Option<Value> {
        self.state.read().await.records.get(&(entity, id)).cloned()
    }

    fn matches(id: u64, record: &Value, filters: &RecordFilters) -> bool {
        if let Some(filter_id) = &filters.id
            && filter_id.parse::<u64>().ok() != Some(id)
        {
            return false;
        }
        if let Some(semester) = filters.semester
            && record.get("semester").and_then(Value::as_i64) != Some(i64::from(semester))
        {
            return false;
        }
        if let Some(department) = &filters.department {
            let found = record
                .get("department")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !found.to_lowercase().contains(&department.to_lowercase()) {
                return false;
            }
        }

        filters
            .fields
            .iter()
            .all(|(key, value)| record.get(key) == Some(value))
    }

    fn matching_ids(state: &GatewayState, entity: EntityKind, filters: &RecordFilters) -> Vec<u64> {
        state
            .records
            .iter()
            .filter(|((stored_entity, id), record)| {
                *stored_entity == entity && Self::matches(*id, record, filters)
            })
            .map(|((_, id), _)| *id)
            .collect()
    }

    fn snapshot(entity: EntityKind, id: u64, data: Value) -> RecordSnapshot {
        RecordSnapshot {
            entity,
            record_id: id.to_string(),
            data,
        }
    }

    fn parse_record_id(record_id: &str) -> AppResult<u64> {
        record_id.parse::<u64>().map_err(|_| {
            AppError::Validation(format!("record id '{record_id}' is not a known key"))
        })
    }
}

#[async_trait]
impl DomainDataGateway for InMemoryDomainGateway {
    async fn query(
        &self,
        entity: EntityKind,
        filters: &RecordFilters,
        limit: Option<usize>,
    ) -> AppResult<Vec<RecordSnapshot>> {
        let state = self.state.read().await;
        let mut matched: Vec<RecordSnapshot> = state
            .records
            .iter()
            .filter(|((stored_entity, id), record)| {
                *stored_entity == entity && Self::matches(*id, record, filters)
            })
            .map(|((_, id), record)| Self::snapshot(entity, *id, record.clone()))
            .collect();

        if let Some(limit) = limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn count(&self, entity: EntityKind, filters: &RecordFilters) -> AppResult<u64> {
        let state = self.state.read().await;
        let count = state
            .records
            .iter()
            .filter(|((stored_entity, id), record)| {
                *stored_entity == entity && Self::matches(*id, record, filters)
            })
            .count();

        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn mutate(
        &self,
        entity: EntityKind,
        mutation: DomainMutation,
    ) -> AppResult<Vec<RecordSnapshot>> {
        let mut state = self.state.write().await;

        match mutation {
            DomainMutation::Insert { values } => {
                if values.is_empty() {
                    return Err(AppError::Validation(
                        "cannot insert a record without field values".to_owned(),
                    ));
                }
                state.next_id += 1;
                let id = state.next_id;
                let record = Value::Object(values.into_iter().collect());
                state.records.insert((entity, id), record.clone());
                Ok(vec![Self::snapshot(entity, id, record)])
            }
            DomainMutation::Update { filters, values } => {
                if values.is_empty() {
                    return Err(AppError::Validation(
                        "cannot update records without field values".to_owned(),
                    ));
                }
                let ids = Self::matching_ids(&state, entity, &filters);
                let mut post = Vec::new();
                for id in ids {
                    if let Some(record) = state.records.get_mut(&(entity, id)) {
                        if let Value::Object(object) = record {
                            for (key, value) in &values {
                                object.insert(key.clone(), value.clone());
                            }
                        }
                        post.push(Self::snapshot(entity, id, record.clone()));
                    }
                }
                Ok(post)
            }
            DomainMutation::Delete { filters } => {
                let ids = Self::matching_ids(&state, entity, &filters);
                let mut removed = Vec::new();
                for id in ids {
                    if let Some(record) = state.records.remove(&(entity, id)) {
                        removed.push(Self::snapshot(entity, id, record));
                    }
                }
                Ok(removed)
            }
            DomainMutation::Restore { snapshots } => {
                // Validate every key before touching state so the restore is
                // all-or-nothing.
                let mut pairs = Vec::with_capacity(snapshots.len());
                for snapshot in snapshots {
                    let id = Self::parse_record_id(&snapshot.record_id)?;
                    pairs.push((id, snapshot.data));
                }
                let mut restored = Vec::new();
                for (id, data) in pairs {
                    state.records.insert((entity, id), data.clone());
                    restored.push(Self::snapshot(entity, id, data));
                }
                Ok(restored)
            }
            DomainMutation::DeleteByKey { record_ids } => {
                let mut ids = Vec::with_capacity(record_ids.len());
                for record_id in &record_ids {
                    ids.push(Self::parse_record_id(record_id)?);
                }
                let mut removed = Vec::new();
                for id in ids {
                    if let Some(record) = state.records.remove(&(entity, id)) {
                        removed.push(Self::snapshot(entity, id, record));
                    }
                }
                Ok(removed)
            }
        }
    }
}
