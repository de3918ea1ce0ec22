use opsgate_core::PlanId;
use opsgate_domain::{DecisionKind, ExecutionRecord, ModuleKind, Plan};

mod audit;
mod classifier;
mod data_gateway;
mod notifier;
mod stores;
mod two_factor;

pub use audit::{AuditLog, AuditQuery, GovernanceStats, MAX_AUDIT_RESULTS};
pub use classifier::IntentClassifier;
pub use data_gateway::{DomainDataGateway, DomainMutation};
pub use notifier::{GovernanceNotification, Notifier, NotificationKind};
pub use stores::{ExecutionStore, PlanStore};
pub use two_factor::TwoFactorVerifier;

/// Input payload for command submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCommandInput {
    /// Raw natural-language command.
    pub command: String,
    /// Optional module hint forwarded to the classifier.
    pub module: Option<ModuleKind>,
    /// Clarification appended when resubmitting a paused command.
    pub clarification: Option<String>,
}

/// Details the actor must clarify before the command can proceed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationRequest {
    /// Required details the classifier could not extract.
    pub missing_fields: Vec<String>,
    /// Question to present to the actor.
    pub question: Option<String>,
    /// Confidence the classifier reported.
    pub confidence: f64,
    /// Confidence threshold the plan fell below.
    pub threshold: f64,
}

/// Outcome of one command submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedPlan {
    /// The persisted plan.
    pub plan: Plan,
    /// Set when the plan paused for clarification.
    pub clarification: Option<ClarificationRequest>,
    /// Set when a LOW-risk plan executed immediately.
    pub auto_execution: Option<ExecutionRecord>,
}

/// Input payload for recording a reviewer decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionInput {
    /// Plan the decision applies to.
    pub plan_id: PlanId,
    /// Verdict.
    pub decision: DecisionKind,
    /// Free-form reviewer comment.
    pub comment: Option<String>,
    /// Second-factor code, required for HIGH-risk plans.
    pub two_factor_code: Option<String>,
    /// Current freshness token of the plan's actor, as known to the caller's
    /// auth layer. When set, a mismatch against the creation-time snapshot
    /// rejects the decision as stale.
    pub actor_token: Option<String>,
}

/// Outcome of one recorded decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    /// The transitioned plan.
    pub plan: Plan,
    /// Execution produced when the decision was an approval.
    pub execution: Option<ExecutionRecord>,
}

/// Outcome of one execution or rollback request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// The transitioned plan.
    pub plan: Plan,
    /// The execution record.
    pub execution: ExecutionRecord,
}
