use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use opsgate_core::{ActorRole, ActorSnapshot, AppError, PlanId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    CommandIntent, EntityKind, GatingRequirements, ModuleKind, PermissionReason, RiskLevel,
};

/// Lifecycle state of one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Classified and persisted, not yet routed.
    Created,
    /// The classifier could not extract required details; the actor must
    /// resubmit with clarification, which produces a fresh plan.
    ClarificationRequired,
    /// Denied before risk classification.
    PermissionDenied,
    /// MEDIUM risk, waiting for the actor's confirmation.
    AwaitingConfirmation,
    /// HIGH risk, waiting for a senior reviewer.
    AwaitingSeniorApproval,
    /// Decision recorded, execution not yet finished.
    Approved,
    /// LOW risk, executed without a human decision.
    AutoExecuted,
    /// Executed after an approval.
    Executed,
    /// Rejected by a reviewer.
    Rejected,
    /// Forwarded to a higher-privilege review queue.
    Escalated,
    /// The domain mutation failed; a fresh submission is required to retry.
    Failed,
    /// Execution reversed from captured snapshots.
    RolledBack,
}

impl PlanStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ClarificationRequired => "clarification_required",
            Self::PermissionDenied => "permission_denied",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::AwaitingSeniorApproval => "awaiting_senior_approval",
            Self::Approved => "approved",
            Self::AutoExecuted => "auto_executed",
            Self::Executed => "executed",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Returns whether a decision may still be recorded.
    #[must_use]
    pub fn is_awaiting_decision(&self) -> bool {
        matches!(self, Self::AwaitingConfirmation | Self::AwaitingSeniorApproval)
    }

    /// Returns whether the plan reached an end state. `executed` and
    /// `auto_executed` are terminal for decisions even though the rollback
    /// transition remains available from them.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::Created
                | Self::AwaitingConfirmation
                | Self::AwaitingSeniorApproval
                | Self::Approved
        )
    }

    /// Returns whether `next` is a legal lifecycle transition from `self`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Created,
                Self::AwaitingConfirmation
                    | Self::AwaitingSeniorApproval
                    | Self::AutoExecuted
                    | Self::Failed
            ) | (Self::AwaitingConfirmation, Self::Approved | Self::Rejected)
                | (
                    Self::AwaitingSeniorApproval,
                    Self::Approved | Self::Rejected | Self::Escalated
                )
                | (Self::Approved, Self::Executed | Self::Failed)
                | (Self::Executed | Self::AutoExecuted, Self::RolledBack)
        )
    }
}

impl FromStr for PlanStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(Self::Created),
            "clarification_required" => Ok(Self::ClarificationRequired),
            "permission_denied" => Ok(Self::PermissionDenied),
            "awaiting_confirmation" => Ok(Self::AwaitingConfirmation),
            "awaiting_senior_approval" => Ok(Self::AwaitingSeniorApproval),
            "approved" => Ok(Self::Approved),
            "auto_executed" => Ok(Self::AutoExecuted),
            "executed" => Ok(Self::Executed),
            "rejected" => Ok(Self::Rejected),
            "escalated" => Ok(Self::Escalated),
            "failed" => Ok(Self::Failed),
            "rolled_back" => Ok(Self::RolledBack),
            other => Err(AppError::Validation(format!(
                "unknown plan status '{other}'"
            ))),
        }
    }
}

impl Display for PlanStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Reviewer verdict on a gated plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    /// Move the plan to execution.
    Approve,
    /// Terminally reject the plan.
    Reject,
    /// Forward a HIGH-risk plan to a higher-privilege review queue.
    Escalate,
}

impl DecisionKind {
    /// Returns a stable storage value for this decision.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Escalate => "ESCALATE",
        }
    }
}

impl FromStr for DecisionKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            "ESCALATE" => Ok(Self::Escalate),
            other => Err(AppError::Validation(format!("unknown decision '{other}'"))),
        }
    }
}

/// Human decision captured on a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Verdict.
    pub decision: DecisionKind,
    /// Subject of the deciding actor.
    pub decided_by: String,
    /// Role of the deciding actor at decision time.
    pub decided_by_role: ActorRole,
    /// Free-form reviewer comment.
    pub comment: Option<String>,
    /// Whether a second factor was verified with this decision.
    pub two_factor_verified: bool,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
}

/// Point-in-time copy of one domain record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Entity the record belongs to.
    pub entity: EntityKind,
    /// Stable record identifier.
    pub record_id: String,
    /// Record payload; `Null` marks a tombstone (the record does not exist
    /// on this side of the mutation).
    pub data: Value,
}

impl RecordSnapshot {
    /// Creates a tombstone snapshot marking absence of the record.
    #[must_use]
    pub fn tombstone(entity: EntityKind, record_id: impl Into<String>) -> Self {
        Self {
            entity,
            record_id: record_id.into(),
            data: Value::Null,
        }
    }

    /// Returns whether this snapshot marks absence of the record.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.data.is_null()
    }
}

/// Rollback feasibility note computed during impact estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackFeasibility {
    /// Whether captured snapshots can reverse this operation.
    pub supports_rollback: bool,
    /// Reason when rollback is not supported.
    pub reason: Option<String>,
}

impl RollbackFeasibility {
    /// Feasible rollback via before-state snapshots.
    #[must_use]
    pub fn supported() -> Self {
        Self {
            supports_rollback: true,
            reason: None,
        }
    }

    /// Infeasible rollback with the blocking reason.
    #[must_use]
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            supports_rollback: false,
            reason: Some(reason.into()),
        }
    }
}

/// Bounded, read-only preview of what a plan would touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactPreview {
    /// Full estimated count; may exceed the preview length.
    pub total_count: u64,
    /// First N affected records.
    pub affected_records: Vec<RecordSnapshot>,
    /// Affected records with proposed values applied, for mutating intents.
    pub proposed_changes: Vec<RecordSnapshot>,
    /// Rollback feasibility note.
    pub rollback: RollbackFeasibility,
}

impl ImpactPreview {
    /// Empty preview used for plans that stop before estimation.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            affected_records: Vec::new(),
            proposed_changes: Vec::new(),
            rollback: RollbackFeasibility::unsupported("impact was not estimated"),
        }
    }
}

/// One governed operational plan: a classified, risk-scored representation of
/// one submitted command. Owned by the orchestrator; only the orchestrator
/// transitions its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Opaque identifier, immutable after creation.
    pub plan_id: PlanId,
    /// Actor snapshot captured at creation time.
    pub actor: ActorSnapshot,
    /// Functional module the targeted entity belongs to.
    pub module: ModuleKind,
    /// Raw command text as submitted.
    pub command: String,
    /// Clarification appended on resubmission, if any.
    pub clarification: Option<String>,
    /// Normalized intent.
    pub intent: CommandIntent,
    /// Classified tier, immutable after computation; re-classification
    /// requires a new plan.
    pub risk_level: RiskLevel,
    /// Estimated number of affected records.
    pub estimated_impact_count: u64,
    /// Bounded impact preview.
    pub preview: ImpactPreview,
    /// Lifecycle state.
    pub status: PlanStatus,
    /// Gates derived from the risk tier, fixed at classification time.
    pub gates: GatingRequirements,
    /// Whether a denied command was offered the escalation path.
    pub escalation_required: bool,
    /// Permission evaluation reason recorded at creation.
    pub permission_reason: PermissionReason,
    /// Reviewer decision once recorded.
    pub decision: Option<DecisionRecord>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
}
