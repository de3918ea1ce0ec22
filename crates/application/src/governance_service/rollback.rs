use chrono::Utc;
use opsgate_core::{ActorSnapshot, AppError, AppResult, ExecutionId};
use opsgate_domain::{AuditEntry, AuditEventType, ExecutionStatus, IntentType, PlanStatus};
use serde_json::json;
use tracing::info;

use super::GovernanceService;
use crate::governance_ports::{DomainMutation, ExecutionOutcome, NotificationKind};

impl GovernanceService {
    /// Reverses an executed mutation from its captured before-state.
    ///
    /// UPDATE and DELETE restore the snapshots; CREATE deletes the created
    /// records by key. Rollback is idempotent: a second request on an already
    /// rolled-back execution is a no-op success. Read-only executions and
    /// executions whose feasibility note was negative fail with
    /// `RollbackUnsupported`.
    pub async fn rollback_execution(
        &self,
        actor: &ActorSnapshot,
        execution_id: &ExecutionId,
    ) -> AppResult<ExecutionOutcome> {
        let execution = self
            .execution_store
            .find_execution(execution_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("execution '{execution_id}' does not exist"))
            })?;
        let plan = self.require_plan(&execution.plan_id).await?;

        if execution.status == ExecutionStatus::RolledBack {
            return Ok(ExecutionOutcome { plan, execution });
        }

        if execution.status == ExecutionStatus::Failed {
            return Err(AppError::Validation(format!(
                "execution '{execution_id}' did not apply changes; there is nothing to roll back"
            )));
        }

        if !execution.intent_type.mutates() || !execution.supports_rollback {
            let reason = plan
                .preview
                .rollback
                .reason
                .clone()
                .unwrap_or_else(|| "read-only operation leaves nothing to restore".to_owned());
            return Err(AppError::RollbackUnsupported(reason));
        }

        // Senior reviewers or the executing actor may reverse an execution.
        if !self.policy.is_senior(actor.role()) && actor.subject() != execution.executed_by {
            return Err(AppError::Forbidden(
                "rollback requires a senior role or the executing actor".to_owned(),
            ));
        }

        let inverse = match execution.intent_type {
            IntentType::Create => DomainMutation::DeleteByKey {
                record_ids: execution
                    .after_state
                    .iter()
                    .filter(|snapshot| !snapshot.is_tombstone())
                    .map(|snapshot| snapshot.record_id.clone())
                    .collect(),
            },
            IntentType::Update | IntentType::Delete => DomainMutation::Restore {
                snapshots: execution
                    .before_state
                    .iter()
                    .filter(|snapshot| !snapshot.is_tombstone())
                    .cloned()
                    .collect(),
            },
            IntentType::Read | IntentType::Analyze | IntentType::Escalate => {
                return Err(AppError::RollbackUnsupported(
                    "read-only operation leaves nothing to restore".to_owned(),
                ));
            }
        };

        if let Err(error) = self.gateway.mutate(execution.entity, inverse).await {
            // The failed reversal is recorded before it is surfaced.
            self.audit(AuditEntry::for_plan(
                AuditEventType::Failed,
                &plan,
                Some(execution.execution_id.clone()),
                json!({ "phase": "rollback", "error": error.to_string() }),
            ))
            .await?;

            return Err(AppError::ExecutionFailed(format!(
                "rollback mutation failed: {error}"
            )));
        }

        let execution = match self
            .execution_store
            .mark_rolled_back(execution_id, Utc::now())
            .await
        {
            Ok(execution) => execution,
            Err(AppError::Conflict(message)) => {
                // Lost a race against a concurrent rollback; the reversal is
                // already done.
                let current = self
                    .execution_store
                    .find_execution(execution_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("execution '{execution_id}' does not exist"))
                    })?;
                if current.status != ExecutionStatus::RolledBack {
                    return Err(AppError::Conflict(message));
                }
                current
            }
            Err(error) => return Err(error),
        };

        let plan = match self
            .plan_store
            .transition_status(
                &plan.plan_id,
                &[PlanStatus::Executed, PlanStatus::AutoExecuted],
                PlanStatus::RolledBack,
                None,
            )
            .await
        {
            Ok(plan) => plan,
            Err(AppError::Conflict(_)) => self.require_plan(&execution.plan_id).await?,
            Err(error) => return Err(error),
        };

        let restored = execution
            .before_state
            .iter()
            .filter(|snapshot| !snapshot.is_tombstone())
            .count();
        self.audit(AuditEntry::for_plan(
            AuditEventType::Rollback,
            &plan,
            Some(execution.execution_id.clone()),
            json!({ "restored_count": restored }),
        ))
        .await?;

        info!(
            plan_id = %plan.plan_id,
            execution_id = %execution.execution_id,
            restored,
            "execution rolled back"
        );
        self.notify_best_effort(&plan, NotificationKind::RolledBack)
            .await;

        Ok(ExecutionOutcome { plan, execution })
    }
}
