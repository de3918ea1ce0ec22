use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use opsgate_core::{ActorRole, AppError, ExecutionId, PlanId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{IntentType, ModuleKind, Plan, RiskLevel};

/// Lifecycle event recorded in the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Plan classified and persisted.
    Created,
    /// Plan paused for clarification.
    ClarificationNeeded,
    /// Plan denied before risk classification.
    PermissionDenied,
    /// Reviewer approved the plan.
    Approved,
    /// Reviewer rejected the plan.
    Rejected,
    /// Reviewer escalated the plan.
    Escalated,
    /// Operation applied successfully.
    Executed,
    /// Operation failed to apply.
    Failed,
    /// Execution reversed from captured snapshots.
    Rollback,
}

impl AuditEventType {
    /// Returns a stable storage value for this event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ClarificationNeeded => "clarification_needed",
            Self::PermissionDenied => "permission_denied",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::Executed => "executed",
            Self::Failed => "failed",
            Self::Rollback => "rollback",
        }
    }
}

impl FromStr for AuditEventType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(Self::Created),
            "clarification_needed" => Ok(Self::ClarificationNeeded),
            "permission_denied" => Ok(Self::PermissionDenied),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "escalated" => Ok(Self::Escalated),
            "executed" => Ok(Self::Executed),
            "failed" => Ok(Self::Failed),
            "rollback" => Ok(Self::Rollback),
            other => Err(AppError::Validation(format!(
                "unknown audit event type '{other}'"
            ))),
        }
    }
}

impl Display for AuditEventType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// One append-only audit ledger row. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Stable event identifier.
    pub event_id: String,
    /// Lifecycle event recorded.
    pub event_type: AuditEventType,
    /// Plan the event belongs to.
    pub plan_id: PlanId,
    /// Execution the event belongs to, when one exists.
    pub execution_id: Option<ExecutionId>,
    /// Subject of the plan's actor.
    pub actor_subject: String,
    /// Role of the plan's actor at plan creation.
    pub actor_role: ActorRole,
    /// Risk tier of the plan.
    pub risk_level: RiskLevel,
    /// Intent of the plan.
    pub operation_type: IntentType,
    /// Module of the targeted entity.
    pub module: ModuleKind,
    /// Event-specific detail.
    pub payload: Value,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Builds an entry for one lifecycle event of a plan.
    #[must_use]
    pub fn for_plan(
        event_type: AuditEventType,
        plan: &Plan,
        execution_id: Option<ExecutionId>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: generate_event_id(),
            event_type,
            plan_id: plan.plan_id.clone(),
            execution_id,
            actor_subject: plan.actor.subject().to_owned(),
            actor_role: plan.actor.role(),
            risk_level: plan.risk_level,
            operation_type: plan.intent.intent_type,
            module: plan.module,
            payload,
            created_at: Utc::now(),
        }
    }
}

fn generate_event_id() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(16);
    format!("audit_{token}")
}
