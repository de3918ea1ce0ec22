use std::collections::HashMap;

use chrono::Utc;
use opsgate_core::{ActorSnapshot, AppError, AppResult, ExecutionId, PlanId};
use opsgate_domain::{
    AuditEntry, AuditEventType, EntityKind, ExecutionRecord, ExecutionStatus, IntentType, Plan,
    PlanStatus, RecordSnapshot,
};
use serde_json::json;
use tracing::info;

use super::GovernanceService;
use crate::governance_ports::{DomainMutation, ExecutionOutcome, NotificationKind};

impl GovernanceService {
    /// Executes a plan that was approved, or re-drives an auto-executable
    /// plan that never left `created` (for example after a crash between
    /// persistence and the auto-execute step).
    pub async fn execute_plan(
        &self,
        actor: &ActorSnapshot,
        plan_id: &PlanId,
    ) -> AppResult<ExecutionOutcome> {
        let plan = self.require_plan(plan_id).await?;

        match plan.status {
            PlanStatus::Approved => {
                let (plan, execution) = self
                    .run_execution(plan, actor, PlanStatus::Approved, PlanStatus::Executed)
                    .await?;
                Ok(ExecutionOutcome { plan, execution })
            }
            PlanStatus::Created if plan.gates.auto_executable() => {
                let (plan, execution) = self
                    .run_execution(plan, actor, PlanStatus::Created, PlanStatus::AutoExecuted)
                    .await?;
                Ok(ExecutionOutcome { plan, execution })
            }
            status => Err(AppError::Conflict(format!(
                "plan '{plan_id}' is not executable from status '{status}'"
            ))),
        }
    }

    /// Single execution entry point shared by the auto-execute and gated
    /// paths; the routing decision stays in the callers.
    pub(super) async fn run_execution(
        &self,
        plan: Plan,
        executed_by: &ActorSnapshot,
        from: PlanStatus,
        success_status: PlanStatus,
    ) -> AppResult<(Plan, ExecutionRecord)> {
        let execution = self.apply_plan(&plan, executed_by).await?;
        self.execution_store
            .insert_execution(execution.clone())
            .await?;

        if execution.status == ExecutionStatus::Executed {
            let plan = self
                .plan_store
                .transition_status(&plan.plan_id, &[from], success_status, None)
                .await?;
            self.audit(AuditEntry::for_plan(
                AuditEventType::Executed,
                &plan,
                Some(execution.execution_id.clone()),
                json!({
                    "affected_count": execution.affected_count,
                    "supports_rollback": execution.supports_rollback,
                }),
            ))
            .await?;

            info!(
                plan_id = %plan.plan_id,
                execution_id = %execution.execution_id,
                affected = execution.affected_count,
                "plan executed"
            );
            self.notify_best_effort(&plan, NotificationKind::Executed)
                .await;

            return Ok((plan, execution));
        }

        let plan = self
            .plan_store
            .transition_status(&plan.plan_id, &[from], PlanStatus::Failed, None)
            .await?;
        let error = execution
            .error
            .clone()
            .unwrap_or_else(|| "domain mutation failed".to_owned());

        // The failure is recorded before it is surfaced, so the audit trail
        // is complete even though the operation did not succeed.
        self.audit(AuditEntry::for_plan(
            AuditEventType::Failed,
            &plan,
            Some(execution.execution_id.clone()),
            json!({ "error": error }),
        ))
        .await?;
        self.notify_best_effort(&plan, NotificationKind::ExecutionFailed)
            .await;

        Err(AppError::ExecutionFailed(error))
    }

    /// Applies the plan's operation against the domain gateway, capturing
    /// index-aligned before/after snapshots around the mutation. A failed
    /// mutation still yields a `failed` execution record with the attempted
    /// before-state for forensics.
    async fn apply_plan(
        &self,
        plan: &Plan,
        executed_by: &ActorSnapshot,
    ) -> AppResult<ExecutionRecord> {
        let intent = &plan.intent;
        let entity = intent.entity;
        let base = ExecutionRecord {
            execution_id: ExecutionId::generate(),
            plan_id: plan.plan_id.clone(),
            intent_type: intent.intent_type,
            entity,
            status: ExecutionStatus::Executed,
            before_state: Vec::new(),
            after_state: Vec::new(),
            affected_count: 0,
            error: None,
            supports_rollback: false,
            executed_by: executed_by.subject().to_owned(),
            executed_at: Utc::now(),
            rolled_back_at: None,
        };

        // Read-only intents carry no snapshots; the preview already holds
        // the matched rows.
        if !intent.intent_type.mutates() {
            return match self.gateway.query(entity, &intent.filters, None).await {
                Ok(matched) => Ok(ExecutionRecord {
                    affected_count: u64::try_from(matched.len()).unwrap_or(u64::MAX),
                    ..base
                }),
                Err(error) => Ok(ExecutionRecord {
                    status: ExecutionStatus::Failed,
                    error: Some(error.to_string()),
                    ..base
                }),
            };
        }

        let before = if intent.intent_type == IntentType::Create {
            Vec::new()
        } else {
            match self.gateway.query(entity, &intent.filters, None).await {
                Ok(rows) => rows,
                Err(error) => {
                    return Ok(ExecutionRecord {
                        status: ExecutionStatus::Failed,
                        error: Some(format!("before-state capture failed: {error}")),
                        ..base
                    });
                }
            }
        };

        let mutation = match intent.intent_type {
            IntentType::Create => DomainMutation::Insert {
                values: intent.values.clone(),
            },
            IntentType::Update => DomainMutation::Update {
                filters: intent.filters.clone(),
                values: intent.values.clone(),
            },
            IntentType::Delete => DomainMutation::Delete {
                filters: intent.filters.clone(),
            },
            IntentType::Read | IntentType::Analyze | IntentType::Escalate => {
                return Ok(base);
            }
        };

        match self.gateway.mutate(entity, mutation).await {
            Ok(post) => {
                let (before_state, after_state) =
                    align_snapshots(intent.intent_type, entity, before, post);
                let affected = if intent.intent_type == IntentType::Create {
                    after_state.iter().filter(|s| !s.is_tombstone()).count()
                } else {
                    before_state.len()
                };

                Ok(ExecutionRecord {
                    before_state,
                    after_state,
                    affected_count: u64::try_from(affected).unwrap_or(u64::MAX),
                    supports_rollback: plan.preview.rollback.supports_rollback,
                    ..base
                })
            }
            Err(error) => {
                // The gateway's transaction boundary is all-or-nothing, so a
                // failed mutation leaves state unchanged: after equals before.
                Ok(ExecutionRecord {
                    status: ExecutionStatus::Failed,
                    before_state: before.clone(),
                    after_state: before,
                    error: Some(error.to_string()),
                    ..base
                })
            }
        }
    }
}

/// Aligns before/after snapshot sequences index by index. Records absent on
/// one side of the mutation are represented by tombstones at the matching
/// index, keeping the sequences equal in length.
fn align_snapshots(
    intent_type: IntentType,
    entity: EntityKind,
    before: Vec<RecordSnapshot>,
    post: Vec<RecordSnapshot>,
) -> (Vec<RecordSnapshot>, Vec<RecordSnapshot>) {
    match intent_type {
        IntentType::Create => {
            let before = post
                .iter()
                .map(|snapshot| RecordSnapshot::tombstone(entity, snapshot.record_id.clone()))
                .collect();
            (before, post)
        }
        IntentType::Update => {
            let by_id: HashMap<&str, &RecordSnapshot> = post
                .iter()
                .map(|snapshot| (snapshot.record_id.as_str(), snapshot))
                .collect();
            let after = before
                .iter()
                .map(|snapshot| {
                    by_id
                        .get(snapshot.record_id.as_str())
                        .map(|found| (*found).clone())
                        .unwrap_or_else(|| {
                            RecordSnapshot::tombstone(entity, snapshot.record_id.clone())
                        })
                })
                .collect();
            (before, after)
        }
        IntentType::Delete => {
            // The gateway returns removed records as they were at removal,
            // which is the authoritative before-state.
            let after = post
                .iter()
                .map(|snapshot| RecordSnapshot::tombstone(entity, snapshot.record_id.clone()))
                .collect();
            (post, after)
        }
        IntentType::Read | IntentType::Analyze | IntentType::Escalate => (before, post),
    }
}
