use opsgate_core::{ActorSnapshot, AppError, AppResult, NonEmptyString};
use opsgate_domain::{
    AuditEntry, AuditEventType, CommandIntent, GatingRequirements, PermissionDecision,
    PermissionReason, PlanStatus, classify_risk, evaluate_permission,
};
use serde_json::json;
use tracing::info;

use super::GovernanceService;
use crate::governance_policy::GateMode;
use crate::governance_ports::{
    ClarificationRequest, NotificationKind, SubmitCommandInput, SubmittedPlan,
};

impl GovernanceService {
    /// Submits one natural-language command through the full governance
    /// pipeline: classification, clarification check, permission gate, impact
    /// estimation, risk classification, persistence and routing.
    pub async fn submit_command(
        &self,
        actor: &ActorSnapshot,
        input: SubmitCommandInput,
    ) -> AppResult<SubmittedPlan> {
        let command = NonEmptyString::new(input.command)?;

        let extraction = tokio::time::timeout(
            self.policy.classification_timeout,
            self.classifier
                .classify(command.as_str(), input.module, input.clarification.as_deref()),
        )
        .await
        .map_err(|_| AppError::Internal("intent classification timed out".to_owned()))??;

        let (intent, missing_fields) = CommandIntent::from_extraction(&extraction);

        // 1. Clarification loop: ambiguous commands pause before any
        //    downstream state is produced.
        if !missing_fields.is_empty() || intent.confidence < self.policy.confidence_threshold {
            let plan = self.new_plan(
                actor,
                &command,
                input.clarification,
                intent,
                PlanStatus::ClarificationRequired,
                &PermissionDecision {
                    allowed: true,
                    reason: PermissionReason::Ok,
                    escalation_required: false,
                },
            );
            self.plan_store.insert_plan(plan.clone()).await?;
            self.audit(AuditEntry::for_plan(
                AuditEventType::ClarificationNeeded,
                &plan,
                None,
                json!({
                    "missing_fields": missing_fields,
                    "question": extraction.clarification_question,
                    "confidence": plan.intent.confidence,
                    "threshold": self.policy.confidence_threshold,
                }),
            ))
            .await?;

            info!(plan_id = %plan.plan_id, "command paused for clarification");

            let clarification = ClarificationRequest {
                missing_fields,
                question: extraction.clarification_question.clone(),
                confidence: plan.intent.confidence,
                threshold: self.policy.confidence_threshold,
            };

            return Ok(SubmittedPlan {
                plan,
                clarification: Some(clarification),
                auto_execution: None,
            });
        }

        // 2. Permission gate. A denied command never reaches risk
        //    classification or the impact estimator.
        let permission = evaluate_permission(
            actor,
            intent.intent_type,
            intent.entity,
            intent.filters.department.as_deref(),
        );
        if !permission.allowed {
            let plan = self.new_plan(
                actor,
                &command,
                input.clarification,
                intent,
                PlanStatus::PermissionDenied,
                &permission,
            );
            self.plan_store.insert_plan(plan.clone()).await?;
            self.audit(AuditEntry::for_plan(
                AuditEventType::PermissionDenied,
                &plan,
                None,
                json!({
                    "reason": permission.reason.as_str(),
                    "escalation_required": permission.escalation_required,
                }),
            ))
            .await?;

            info!(
                plan_id = %plan.plan_id,
                reason = permission.reason.as_str(),
                "command denied by permission policy"
            );

            return Ok(SubmittedPlan {
                plan,
                clarification: None,
                auto_execution: None,
            });
        }

        // 3. Impact preview and risk classification.
        let preview = self.impact.estimate(&intent).await?;
        let estimated_impact_count = preview.total_count;
        let risk_level = classify_risk(
            intent.intent_type,
            intent.entity,
            estimated_impact_count,
            &intent.affected_fields,
            &self.policy.risk_thresholds,
        );
        let gates = match self.policy.gate_mode {
            GateMode::Gated => GatingRequirements::derive(
                risk_level,
                intent.intent_type,
                intent.entity,
                estimated_impact_count,
            ),
            GateMode::AuditOnly => GatingRequirements::none(),
        };

        let mut plan = self.new_plan(
            actor,
            &command,
            input.clarification,
            intent,
            PlanStatus::Created,
            &permission,
        );
        plan.risk_level = risk_level;
        plan.estimated_impact_count = estimated_impact_count;
        plan.preview = preview;
        plan.gates = gates;

        self.plan_store.insert_plan(plan.clone()).await?;
        // Write-ahead ordering: the created entry lands before any execution
        // attempt, so a crash mid-execute still leaves an audit trail.
        self.audit(AuditEntry::for_plan(
            AuditEventType::Created,
            &plan,
            None,
            json!({
                "risk_level": plan.risk_level.as_str(),
                "estimated_impact_count": plan.estimated_impact_count,
                "requires_confirmation": plan.gates.requires_confirmation,
                "requires_senior_approval": plan.gates.requires_senior_approval,
                "requires_2fa": plan.gates.requires_2fa,
            }),
        ))
        .await?;

        info!(
            plan_id = %plan.plan_id,
            risk_level = plan.risk_level.as_str(),
            impact = plan.estimated_impact_count,
            "plan created"
        );

        // 4. Route by risk tier.
        if plan.gates.auto_executable() {
            let (plan, execution) = self
                .run_execution(plan, actor, PlanStatus::Created, PlanStatus::AutoExecuted)
                .await?;

            return Ok(SubmittedPlan {
                plan,
                clarification: None,
                auto_execution: Some(execution),
            });
        }

        let next = if plan.gates.requires_senior_approval {
            PlanStatus::AwaitingSeniorApproval
        } else {
            PlanStatus::AwaitingConfirmation
        };
        let plan = self
            .plan_store
            .transition_status(&plan.plan_id, &[PlanStatus::Created], next, None)
            .await?;
        self.notify_best_effort(&plan, NotificationKind::DecisionRequested)
            .await;

        Ok(SubmittedPlan {
            plan,
            clarification: None,
            auto_execution: None,
        })
    }
}
