use opsgate_core::{ActorSnapshot, AppError, AppResult, PlanId};
use opsgate_domain::{AuditEntry, Plan};

use super::GovernanceService;
use crate::governance_ports::{AuditQuery, GovernanceStats, MAX_AUDIT_RESULTS};

impl GovernanceService {
    /// Returns one plan by id.
    pub async fn plan(&self, plan_id: &PlanId) -> AppResult<Plan> {
        self.require_plan(plan_id).await
    }

    /// Lists plans awaiting a decision. Senior reviewers see the full queue;
    /// everyone else receives an empty list.
    pub async fn pending_approvals(&self, actor: &ActorSnapshot) -> AppResult<Vec<Plan>> {
        if !self.policy.is_senior(actor.role()) {
            return Ok(Vec::new());
        }

        self.plan_store.list_awaiting_decision().await
    }

    /// Queries the audit trail. Non-senior actors are scoped to their own
    /// entries; the result count is capped.
    pub async fn audit_history(
        &self,
        actor: &ActorSnapshot,
        mut query: AuditQuery,
    ) -> AppResult<Vec<AuditEntry>> {
        if query.limit == 0 || query.limit > MAX_AUDIT_RESULTS {
            query.limit = MAX_AUDIT_RESULTS;
        }
        if !self.policy.is_senior(actor.role()) {
            query.actor_subject = Some(actor.subject().to_owned());
        }

        self.audit_log.query(query).await
    }

    /// Returns aggregate governance counters for the dashboard. Restricted
    /// to senior roles.
    pub async fn stats(&self, actor: &ActorSnapshot) -> AppResult<GovernanceStats> {
        if !self.policy.is_senior(actor.role()) {
            return Err(AppError::Forbidden(
                "governance stats require a senior role".to_owned(),
            ));
        }

        let mut stats = self.audit_log.stats().await?;
        let pending = self.plan_store.list_awaiting_decision().await?;
        stats.pending_approvals = u64::try_from(pending.len()).unwrap_or(u64::MAX);

        Ok(stats)
    }
}
