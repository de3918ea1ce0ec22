use async_trait::async_trait;
use opsgate_application::{AuditLog, AuditQuery, GovernanceStats, MAX_AUDIT_RESULTS};
use opsgate_core::AppResult;
use opsgate_domain::{AuditEntry, AuditEventType, RiskLevel};
use tokio::sync::RwLock;

/// In-memory append-only audit log implementation.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    /// Creates an empty in-memory audit log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn query(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        let mut matched: Vec<AuditEntry> = entries
            .iter()
            .filter(|entry| {
                query.module.is_none_or(|module| entry.module == module)
                    && query
                        .operation_type
                        .is_none_or(|operation| entry.operation_type == operation)
                    && query.risk_level.is_none_or(|risk| entry.risk_level == risk)
                    && query
                        .actor_subject
                        .as_deref()
                        .is_none_or(|subject| entry.actor_subject == subject)
                    && query.from.is_none_or(|from| entry.created_at >= from)
                    && query.to.is_none_or(|to| entry.created_at <= to)
            })
            .cloned()
            .collect();

        matched.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        matched.truncate(query.limit.min(MAX_AUDIT_RESULTS));

        Ok(matched)
    }

    async fn stats(&self) -> AppResult<GovernanceStats> {
        let entries = self.entries.read().await;
        let mut stats = GovernanceStats::default();

        for entry in entries.iter() {
            match entry.event_type {
                AuditEventType::Created => {
                    stats.total_plans += 1;
                    match entry.risk_level {
                        RiskLevel::Low => stats.low_risk_plans += 1,
                        RiskLevel::Medium => stats.medium_risk_plans += 1,
                        RiskLevel::High => stats.high_risk_plans += 1,
                    }
                    *stats
                        .plans_by_module
                        .entry(entry.module.as_str().to_owned())
                        .or_default() += 1;
                }
                AuditEventType::Executed => stats.executed_total += 1,
                AuditEventType::Failed => stats.failed_total += 1,
                AuditEventType::Rollback => stats.rolled_back_total += 1,
                AuditEventType::ClarificationNeeded
                | AuditEventType::PermissionDenied
                | AuditEventType::Approved
                | AuditEventType::Rejected
                | AuditEventType::Escalated => {}
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;
    use opsgate_application::{AuditLog, AuditQuery};
    use opsgate_core::{ActorRole, PlanId};
    use opsgate_domain::{AuditEntry, AuditEventType, EntityKind, IntentType, RiskLevel};
    use serde_json::json;

    use super::InMemoryAuditLog;

    fn entry(event_type: AuditEventType, risk_level: RiskLevel, subject: &str) -> AuditEntry {
        AuditEntry {
            event_id: format!("audit_{subject}_{}", Utc::now().timestamp_nanos_opt().unwrap_or(0)),
            event_type,
            plan_id: PlanId::generate(),
            execution_id: None,
            actor_subject: subject.to_owned(),
            actor_role: ActorRole::Admin,
            risk_level,
            operation_type: IntentType::Update,
            module: EntityKind::Course.module(),
            payload: json!({}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn query_filters_by_risk_and_subject() {
        let log = InMemoryAuditLog::new();
        log.append(entry(AuditEventType::Created, RiskLevel::High, "alice"))
            .await
            .unwrap();
        log.append(entry(AuditEventType::Created, RiskLevel::Low, "bob"))
            .await
            .unwrap();

        let high = log
            .query(AuditQuery {
                risk_level: Some(RiskLevel::High),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].actor_subject, "alice");

        let scoped = log
            .query(AuditQuery {
                actor_subject: Some("bob".to_owned()),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
    }

    #[tokio::test]
    async fn query_caps_results_and_orders_newest_first() {
        let log = InMemoryAuditLog::new();
        for index in 0..10 {
            log.append(entry(
                AuditEventType::Created,
                RiskLevel::Low,
                &format!("user-{index}"),
            ))
            .await
            .unwrap();
        }

        let limited = log
            .query(AuditQuery {
                limit: 3,
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 3);
        assert!(limited[0].created_at >= limited[2].created_at);
    }

    #[tokio::test]
    async fn stats_aggregate_created_and_outcome_events() {
        let log = InMemoryAuditLog::new();
        log.append(entry(AuditEventType::Created, RiskLevel::High, "alice"))
            .await
            .unwrap();
        log.append(entry(AuditEventType::Created, RiskLevel::Low, "alice"))
            .await
            .unwrap();
        log.append(entry(AuditEventType::Executed, RiskLevel::Low, "alice"))
            .await
            .unwrap();
        log.append(entry(AuditEventType::Rollback, RiskLevel::Low, "alice"))
            .await
            .unwrap();

        let stats = log.stats().await.unwrap();
        assert_eq!(stats.total_plans, 2);
        assert_eq!(stats.high_risk_plans, 1);
        assert_eq!(stats.executed_total, 1);
        assert_eq!(stats.rolled_back_total, 1);
    }
}
