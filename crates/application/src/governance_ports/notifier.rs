use async_trait::async_trait;
use opsgate_core::{AppResult, PlanId};
use opsgate_domain::RiskLevel;

/// Lifecycle moment a notification is sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The plan is waiting for a confirmation or senior approval.
    DecisionRequested,
    /// The plan executed successfully.
    Executed,
    /// The domain mutation failed.
    ExecutionFailed,
    /// A reviewer rejected the plan.
    Rejected,
    /// A reviewer escalated the plan.
    Escalated,
    /// The execution was reversed.
    RolledBack,
}

/// One best-effort notification payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceNotification {
    /// Plan the notification refers to.
    pub plan_id: PlanId,
    /// Lifecycle moment.
    pub kind: NotificationKind,
    /// Risk tier of the plan.
    pub risk_level: RiskLevel,
}

/// Best-effort notification delivery; never on the critical path. Failures
/// are logged and swallowed by the orchestrator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification to a subject.
    async fn notify(&self, subject: &str, notification: &GovernanceNotification) -> AppResult<()>;
}
