use chrono::{DateTime, Utc};
use opsgate_application::{ClarificationRequest, SubmittedPlan};
use opsgate_domain::{AuditEntry, ExecutionRecord, ImpactPreview, Plan, RecordSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request payload for command submission.
#[derive(Debug, Deserialize)]
pub struct SubmitPlanRequest {
    /// Raw natural-language command.
    pub message: String,
    /// Optional module hint forwarded to the classifier.
    #[serde(default)]
    pub module: Option<String>,
    /// Clarification appended when resubmitting a paused command.
    #[serde(default)]
    pub clarification: Option<String>,
}

/// Request payload for recording a decision.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// Plan the decision applies to.
    pub plan_id: String,
    /// APPROVE, REJECT or ESCALATE.
    pub decision: String,
    /// Free-form reviewer comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Second-factor code for HIGH-risk plans.
    #[serde(default)]
    pub two_factor_code: Option<String>,
    /// Current freshness token of the plan's actor, when the caller's auth
    /// layer tracks it.
    #[serde(default)]
    pub actor_token: Option<String>,
}

/// Request payload for executing an approved plan.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Plan to execute.
    pub plan_id: String,
}

/// Request payload for rolling back an execution.
#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    /// Execution to reverse.
    pub execution_id: String,
}

/// Plan projection returned by the API.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    /// Plan identifier.
    pub plan_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Operation category.
    pub intent_type: String,
    /// Targeted entity.
    pub entity: String,
    /// Functional module.
    pub module: String,
    /// Classifier confidence.
    pub confidence: f64,
    /// Risk tier.
    pub risk_level: String,
    /// Estimated number of affected records.
    pub estimated_impact_count: u64,
    /// Whether the actor must confirm before execution.
    pub requires_confirmation: bool,
    /// Whether a senior reviewer must approve.
    pub requires_senior_approval: bool,
    /// Whether the decision needs a second factor.
    pub requires_2fa: bool,
    /// Whether a denied command was offered escalation.
    pub escalation_required: bool,
    /// Permission evaluation reason.
    pub permission_reason: String,
    /// Bounded impact preview.
    pub preview: ImpactPreview,
    /// Recorded decision, if any.
    pub decision: Option<DecisionResponseBody>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Recorded decision projection.
#[derive(Debug, Serialize)]
pub struct DecisionResponseBody {
    /// Verdict.
    pub decision: String,
    /// Deciding subject.
    pub decided_by: String,
    /// Reviewer comment.
    pub comment: Option<String>,
    /// Whether a second factor was verified.
    pub two_factor_verified: bool,
    /// Decision timestamp.
    pub decided_at: DateTime<Utc>,
}

/// Execution projection returned by the API.
#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    /// Execution identifier.
    pub execution_id: String,
    /// Plan the execution belongs to.
    pub plan_id: String,
    /// Operation category applied.
    pub intent_type: String,
    /// Entity targeted.
    pub entity: String,
    /// Outcome status.
    pub status: String,
    /// Number of records touched.
    pub affected_count: u64,
    /// Captured pre-mutation snapshots.
    pub before_state: Vec<RecordSnapshot>,
    /// Captured post-mutation snapshots.
    pub after_state: Vec<RecordSnapshot>,
    /// Failure detail, if the mutation did not apply.
    pub error: Option<String>,
    /// Whether captured snapshots can reverse this execution.
    pub supports_rollback: bool,
    /// Execution timestamp.
    pub executed_at: DateTime<Utc>,
    /// Rollback timestamp once reversed.
    pub rolled_back_at: Option<DateTime<Utc>>,
}

/// Clarification details returned when a command pauses.
#[derive(Debug, Serialize)]
pub struct ClarificationResponse {
    /// Required details the classifier could not extract.
    pub missing_fields: Vec<String>,
    /// Question to present to the actor.
    pub question: Option<String>,
    /// Reported classifier confidence.
    pub confidence: f64,
    /// Confidence threshold the plan fell below.
    pub threshold: f64,
}

/// Response payload for command submission.
#[derive(Debug, Serialize)]
pub struct SubmitPlanResponse {
    /// The persisted plan.
    pub plan: PlanResponse,
    /// Set when the plan paused for clarification.
    pub clarification: Option<ClarificationResponse>,
    /// Set when a LOW-risk plan executed immediately.
    pub auto_execution: Option<ExecutionResponse>,
}

/// Response payload for a recorded decision.
#[derive(Debug, Serialize)]
pub struct DecideResponse {
    /// The transitioned plan.
    pub plan: PlanResponse,
    /// Execution produced by an approval.
    pub execution: Option<ExecutionResponse>,
}

/// Response payload for execute and rollback requests.
#[derive(Debug, Serialize)]
pub struct ExecutionOutcomeResponse {
    /// The transitioned plan.
    pub plan: PlanResponse,
    /// The execution record.
    pub execution: ExecutionResponse,
}

/// Audit entry projection returned by the API.
#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    /// Stable event identifier.
    pub event_id: String,
    /// Lifecycle event.
    pub event_type: String,
    /// Plan the event belongs to.
    pub plan_id: String,
    /// Execution the event belongs to, when one exists.
    pub execution_id: Option<String>,
    /// Subject of the plan's actor.
    pub actor_subject: String,
    /// Role of the plan's actor.
    pub actor_role: String,
    /// Risk tier of the plan.
    pub risk_level: String,
    /// Operation category of the plan.
    pub operation_type: String,
    /// Functional module.
    pub module: String,
    /// Event-specific detail.
    pub payload: Value,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query parameters for the audit history endpoint.
#[derive(Debug, Deserialize)]
pub struct AuditHistoryParams {
    /// Optional module filter.
    #[serde(default)]
    pub module: Option<String>,
    /// Optional operation filter.
    #[serde(default)]
    pub operation_type: Option<String>,
    /// Optional risk tier filter.
    #[serde(default)]
    pub risk_level: Option<String>,
    /// Optional actor subject filter.
    #[serde(default)]
    pub actor: Option<String>,
    /// Inclusive lower bound on the event timestamp.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the event timestamp.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Maximum rows returned.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl From<&Plan> for PlanResponse {
    fn from(plan: &Plan) -> Self {
        Self {
            plan_id: plan.plan_id.as_str().to_owned(),
            status: plan.status.as_str().to_owned(),
            intent_type: plan.intent.intent_type.as_str().to_owned(),
            entity: plan.intent.entity.as_str().to_owned(),
            module: plan.module.as_str().to_owned(),
            confidence: plan.intent.confidence,
            risk_level: plan.risk_level.as_str().to_owned(),
            estimated_impact_count: plan.estimated_impact_count,
            requires_confirmation: plan.gates.requires_confirmation,
            requires_senior_approval: plan.gates.requires_senior_approval,
            requires_2fa: plan.gates.requires_2fa,
            escalation_required: plan.escalation_required,
            permission_reason: plan.permission_reason.as_str().to_owned(),
            preview: plan.preview.clone(),
            decision: plan.decision.as_ref().map(|decision| DecisionResponseBody {
                decision: decision.decision.as_str().to_owned(),
                decided_by: decision.decided_by.clone(),
                comment: decision.comment.clone(),
                two_factor_verified: decision.two_factor_verified,
                decided_at: decision.decided_at,
            }),
            created_at: plan.created_at,
            updated_at: plan.updated_at,
        }
    }
}

impl From<&ExecutionRecord> for ExecutionResponse {
    fn from(execution: &ExecutionRecord) -> Self {
        Self {
            execution_id: execution.execution_id.as_str().to_owned(),
            plan_id: execution.plan_id.as_str().to_owned(),
            intent_type: execution.intent_type.as_str().to_owned(),
            entity: execution.entity.as_str().to_owned(),
            status: execution.status.as_str().to_owned(),
            affected_count: execution.affected_count,
            before_state: execution.before_state.clone(),
            after_state: execution.after_state.clone(),
            error: execution.error.clone(),
            supports_rollback: execution.supports_rollback,
            executed_at: execution.executed_at,
            rolled_back_at: execution.rolled_back_at,
        }
    }
}

impl From<&AuditEntry> for AuditEntryResponse {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            event_id: entry.event_id.clone(),
            event_type: entry.event_type.as_str().to_owned(),
            plan_id: entry.plan_id.as_str().to_owned(),
            execution_id: entry
                .execution_id
                .as_ref()
                .map(|execution_id| execution_id.as_str().to_owned()),
            actor_subject: entry.actor_subject.clone(),
            actor_role: entry.actor_role.as_str().to_owned(),
            risk_level: entry.risk_level.as_str().to_owned(),
            operation_type: entry.operation_type.as_str().to_owned(),
            module: entry.module.as_str().to_owned(),
            payload: entry.payload.clone(),
            created_at: entry.created_at,
        }
    }
}

impl From<&ClarificationRequest> for ClarificationResponse {
    fn from(clarification: &ClarificationRequest) -> Self {
        Self {
            missing_fields: clarification.missing_fields.clone(),
            question: clarification.question.clone(),
            confidence: clarification.confidence,
            threshold: clarification.threshold,
        }
    }
}

impl From<&SubmittedPlan> for SubmitPlanResponse {
    fn from(submitted: &SubmittedPlan) -> Self {
        Self {
            plan: PlanResponse::from(&submitted.plan),
            clarification: submitted.clarification.as_ref().map(Into::into),
            auto_execution: submitted.auto_execution.as_ref().map(Into::into),
        }
    }
}
