use std::sync::Arc;

use chrono::Utc;
use opsgate_core::{ActorSnapshot, AppError, AppResult, NonEmptyString, PlanId};
use opsgate_domain::{
    AuditEntry, CommandIntent, GatingRequirements, ImpactPreview, PermissionDecision, Plan,
    PlanStatus, RiskLevel,
};
use tracing::warn;

use crate::governance_policy::GovernancePolicy;
use crate::governance_ports::{
    AuditLog, DomainDataGateway, ExecutionStore, GovernanceNotification, IntentClassifier,
    Notifier, NotificationKind, PlanStore, TwoFactorVerifier,
};
use crate::impact_estimator::ImpactEstimator;

mod decide;
mod execute;
mod queries;
mod rollback;
mod submit;

/// Governance orchestrator: coordinates classification, permission
/// evaluation, risk gating, execution and rollback into the end-to-end
/// protocol, and is the only component with write access to the plan store
/// and the audit log.
///
/// Each stage re-reads the plan from the store rather than holding it across
/// a long-lived object, so submit, decide, execute and rollback can be
/// invoked from separate requests or processes safely.
#[derive(Clone)]
pub struct GovernanceService {
    classifier: Arc<dyn IntentClassifier>,
    gateway: Arc<dyn DomainDataGateway>,
    plan_store: Arc<dyn PlanStore>,
    execution_store: Arc<dyn ExecutionStore>,
    audit_log: Arc<dyn AuditLog>,
    two_factor: Arc<dyn TwoFactorVerifier>,
    notifier: Option<Arc<dyn Notifier>>,
    impact: ImpactEstimator,
    policy: GovernancePolicy,
}

impl GovernanceService {
    /// Creates a governance service over its collaborator ports.
    #[must_use]
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        gateway: Arc<dyn DomainDataGateway>,
        plan_store: Arc<dyn PlanStore>,
        execution_store: Arc<dyn ExecutionStore>,
        audit_log: Arc<dyn AuditLog>,
        two_factor: Arc<dyn TwoFactorVerifier>,
        policy: GovernancePolicy,
    ) -> Self {
        let impact = ImpactEstimator::new(
            gateway.clone(),
            policy.max_preview_rows,
            policy.estimation_timeout,
        );

        Self {
            classifier,
            gateway,
            plan_store,
            execution_store,
            audit_log,
            two_factor,
            notifier: None,
            impact,
            policy,
        }
    }

    /// Adds optional best-effort notification delivery.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Returns the active governance policy.
    #[must_use]
    pub fn policy(&self) -> &GovernancePolicy {
        &self.policy
    }

    /// Appends one audit entry. Audit writes are a correctness property: a
    /// failed append propagates instead of being swallowed.
    async fn audit(&self, entry: AuditEntry) -> AppResult<()> {
        self.audit_log.append(entry).await
    }

    async fn notify_best_effort(&self, plan: &Plan, kind: NotificationKind) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let notification = GovernanceNotification {
            plan_id: plan.plan_id.clone(),
            kind,
            risk_level: plan.risk_level,
        };

        if let Err(error) = notifier.notify(plan.actor.subject(), &notification).await {
            warn!(plan_id = %plan.plan_id, error = %error, "notification delivery failed");
        }
    }

    async fn require_plan(&self, plan_id: &PlanId) -> AppResult<Plan> {
        self.plan_store
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("plan '{plan_id}' does not exist")))
    }

    fn new_plan(
        &self,
        actor: &ActorSnapshot,
        command: &NonEmptyString,
        clarification: Option<String>,
        intent: CommandIntent,
        status: PlanStatus,
        permission: &PermissionDecision,
    ) -> Plan {
        let now = Utc::now();

        Plan {
            plan_id: PlanId::generate(),
            actor: actor.clone(),
            module: intent.entity.module(),
            command: command.as_str().to_owned(),
            clarification,
            intent,
            risk_level: RiskLevel::Low,
            estimated_impact_count: 0,
            preview: ImpactPreview::empty(),
            status,
            gates: GatingRequirements::none(),
            escalation_required: permission.escalation_required,
            permission_reason: permission.reason,
            decision: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests;
