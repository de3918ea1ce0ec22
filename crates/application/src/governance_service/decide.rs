use chrono::Utc;
use opsgate_core::{ActorSnapshot, AppError, AppResult};
use opsgate_domain::{
    AuditEntry, AuditEventType, DecisionKind, DecisionRecord, PlanStatus, evaluate_permission,
};
use serde_json::json;
use tracing::info;

use super::GovernanceService;
use crate::governance_ports::{DecisionInput, DecisionOutcome, NotificationKind};

/// Statuses a decision may be recorded from.
const AWAITING: &[PlanStatus] = &[
    PlanStatus::AwaitingConfirmation,
    PlanStatus::AwaitingSeniorApproval,
];

impl GovernanceService {
    /// Records a reviewer decision on a gated plan.
    ///
    /// Permission is re-evaluated over the creation-time actor snapshot, the
    /// actor's freshness token is checked against the snapshot, HIGH-risk
    /// plans additionally require a senior reviewer and a verified second
    /// factor, and the status transition itself is a compare-and-swap so two
    /// racing decisions resolve to exactly one winner.
    pub async fn decide(
        &self,
        reviewer: &ActorSnapshot,
        input: DecisionInput,
    ) -> AppResult<DecisionOutcome> {
        let plan = self.require_plan(&input.plan_id).await?;

        if !plan.status.is_awaiting_decision() {
            return Err(AppError::Conflict(format!(
                "plan '{}' is not awaiting a decision (status '{}')",
                plan.plan_id, plan.status
            )));
        }

        // Privilege drift check. When the reviewer is the submitting actor
        // their own snapshot is authoritative; otherwise the caller may
        // forward the submitter's current token.
        let presented_token = if reviewer.subject() == plan.actor.subject() {
            Some(reviewer.freshness_token())
        } else {
            input.actor_token.clone()
        };
        if let Some(token) = presented_token
            && token != plan.actor.freshness_token()
        {
            return Err(AppError::StaleActor(format!(
                "actor '{}' changed since plan '{}' was created; resubmit the command",
                plan.actor.subject(),
                plan.plan_id
            )));
        }

        // Permission is evaluated fresh at decision time, over the snapshot
        // captured at creation. A grant revoked during the wait terminates
        // the plan.
        let permission = evaluate_permission(
            &plan.actor,
            plan.intent.intent_type,
            plan.intent.entity,
            plan.intent.filters.department.as_deref(),
        );
        if !permission.allowed {
            let record = DecisionRecord {
                decision: DecisionKind::Reject,
                decided_by: reviewer.subject().to_owned(),
                decided_by_role: reviewer.role(),
                comment: Some(format!(
                    "permission re-evaluation denied: {}",
                    permission.reason
                )),
                two_factor_verified: false,
                decided_at: Utc::now(),
            };
            let plan = self
                .plan_store
                .transition_status(&plan.plan_id, AWAITING, PlanStatus::Rejected, Some(record))
                .await?;
            self.audit(AuditEntry::for_plan(
                AuditEventType::Rejected,
                &plan,
                None,
                json!({ "reason": permission.reason.as_str() }),
            ))
            .await?;

            return Err(AppError::Forbidden(format!(
                "plan '{}' is no longer permitted: {}",
                plan.plan_id, permission.reason
            )));
        }

        if plan.gates.requires_senior_approval && !self.policy.is_senior(reviewer.role()) {
            return Err(AppError::Forbidden(format!(
                "plan '{}' requires senior approval; role '{}' cannot decide it",
                plan.plan_id,
                reviewer.role()
            )));
        }

        let two_factor_verified = if plan.gates.requires_2fa {
            let code = input.two_factor_code.as_deref().ok_or_else(|| {
                AppError::Unauthorized(
                    "a verified second factor is required for this decision".to_owned(),
                )
            })?;
            if !self.two_factor.verify(reviewer.subject(), code).await? {
                return Err(AppError::Unauthorized(
                    "second factor verification failed".to_owned(),
                ));
            }
            true
        } else {
            false
        };

        if input.decision == DecisionKind::Escalate && !plan.gates.requires_senior_approval {
            return Err(AppError::Validation(
                "only plans awaiting senior approval can be escalated".to_owned(),
            ));
        }

        let (next, event) = match input.decision {
            DecisionKind::Approve => (PlanStatus::Approved, AuditEventType::Approved),
            DecisionKind::Reject => (PlanStatus::Rejected, AuditEventType::Rejected),
            DecisionKind::Escalate => (PlanStatus::Escalated, AuditEventType::Escalated),
        };
        let record = DecisionRecord {
            decision: input.decision,
            decided_by: reviewer.subject().to_owned(),
            decided_by_role: reviewer.role(),
            comment: input.comment.clone(),
            two_factor_verified,
            decided_at: Utc::now(),
        };

        // At-most-one-winner: the compare-and-swap fails with a conflict for
        // every decision that lost the race.
        let plan = self
            .plan_store
            .transition_status(&plan.plan_id, AWAITING, next, Some(record))
            .await?;

        // Write-ahead ordering: the decision entry lands before the
        // execution it authorizes.
        self.audit(AuditEntry::for_plan(
            event,
            &plan,
            None,
            json!({
                "decision": input.decision.as_str(),
                "decided_by": reviewer.subject(),
                "comment": input.comment,
                "two_factor_verified": two_factor_verified,
            }),
        ))
        .await?;

        info!(
            plan_id = %plan.plan_id,
            decision = input.decision.as_str(),
            decided_by = reviewer.subject(),
            "decision recorded"
        );

        match input.decision {
            DecisionKind::Approve => {
                let (plan, execution) = self
                    .run_execution(plan, reviewer, PlanStatus::Approved, PlanStatus::Executed)
                    .await?;
                Ok(DecisionOutcome {
                    plan,
                    execution: Some(execution),
                })
            }
            DecisionKind::Reject => {
                self.notify_best_effort(&plan, NotificationKind::Rejected)
                    .await;
                Ok(DecisionOutcome {
                    plan,
                    execution: None,
                })
            }
            DecisionKind::Escalate => {
                // Escalation is terminal at this layer; the plan is handed to
                // a higher-privilege review queue outside this service.
                self.notify_best_effort(&plan, NotificationKind::Escalated)
                    .await;
                Ok(DecisionOutcome {
                    plan,
                    execution: None,
                })
            }
        }
    }
}
