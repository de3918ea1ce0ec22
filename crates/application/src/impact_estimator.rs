use std::sync::Arc;
use std::time::Duration;

use opsgate_core::{AppError, AppResult};
use opsgate_domain::{
    CommandIntent, ImpactPreview, IntentType, RecordSnapshot, RollbackFeasibility,
};
use serde_json::Value;

use crate::governance_ports::DomainDataGateway;

/// Produces the bounded, read-only impact preview for a plan without
/// mutating any state.
#[derive(Clone)]
pub struct ImpactEstimator {
    gateway: Arc<dyn DomainDataGateway>,
    max_preview_rows: usize,
    timeout: Duration,
}

impl ImpactEstimator {
    /// Creates an estimator over the domain gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn DomainDataGateway>, max_preview_rows: usize, timeout: Duration) -> Self {
        Self {
            gateway,
            max_preview_rows,
            timeout,
        }
    }

    /// Estimates the impact of one normalized intent: full matching count,
    /// the first N affected records, the proposed post-change projection and
    /// a rollback feasibility note. The underlying queries are bounded by the
    /// configured timeout.
    pub async fn estimate(&self, intent: &CommandIntent) -> AppResult<ImpactPreview> {
        tokio::time::timeout(self.timeout, self.load(intent))
            .await
            .map_err(|_| {
                AppError::Internal(format!(
                    "impact estimation exceeded {} ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    async fn load(&self, intent: &CommandIntent) -> AppResult<ImpactPreview> {
        if intent.intent_type == IntentType::Create {
            // Nothing existing is touched; the impact is the record to insert.
            let proposed = RecordSnapshot {
                entity: intent.entity,
                record_id: "(new)".to_owned(),
                data: Value::Object(intent.values.clone().into_iter().collect()),
            };

            return Ok(ImpactPreview {
                total_count: 1,
                affected_records: Vec::new(),
                proposed_changes: vec![proposed],
                rollback: Self::feasibility(intent),
            });
        }

        let total_count = self.gateway.count(intent.entity, &intent.filters).await?;
        let affected_records = self
            .gateway
            .query(intent.entity, &intent.filters, Some(self.max_preview_rows))
            .await?;

        let proposed_changes = if intent.intent_type == IntentType::Update
            && !intent.values.is_empty()
        {
            affected_records
                .iter()
                .map(|snapshot| {
                    let mut data = snapshot.data.clone();
                    if let Value::Object(object) = &mut data {
                        for (key, value) in &intent.values {
                            object.insert(key.clone(), value.clone());
                        }
                    }
                    RecordSnapshot {
                        entity: snapshot.entity,
                        record_id: snapshot.record_id.clone(),
                        data,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(ImpactPreview {
            total_count,
            affected_records,
            proposed_changes,
            rollback: Self::feasibility(intent),
        })
    }

    fn feasibility(intent: &CommandIntent) -> RollbackFeasibility {
        match intent.intent_type {
            IntentType::Read | IntentType::Analyze | IntentType::Escalate => {
                RollbackFeasibility::unsupported("read-only operation leaves nothing to restore")
            }
            IntentType::Delete if intent.entity.delete_cascades() => {
                RollbackFeasibility::unsupported(format!(
                    "deleting {} records cascades into dependent records; snapshots cannot restore the cascade",
                    intent.entity
                ))
            }
            IntentType::Create | IntentType::Update | IntentType::Delete => {
                RollbackFeasibility::supported()
            }
        }
    }
}
