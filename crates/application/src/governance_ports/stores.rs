use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgate_core::{AppResult, ExecutionId, PlanId};
use opsgate_domain::{DecisionRecord, ExecutionRecord, Plan, PlanStatus};

/// Durable keyed storage for plans; the single source of truth for what was
/// decided. Only the orchestrator writes through this port.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Persists a freshly created plan.
    async fn insert_plan(&self, plan: Plan) -> AppResult<()>;

    /// Returns one plan by id. Plans are retained indefinitely.
    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<Plan>>;

    /// Transitions a plan's status with compare-and-swap semantics.
    ///
    /// The transition applies only while the current status is in `expected`
    /// and the move is legal per [`PlanStatus::can_transition_to`]; otherwise
    /// the call fails with `AppError::Conflict` and the plan is untouched.
    /// Two racing decisions therefore resolve to exactly one winner. A
    /// provided decision record is stored with the transition.
    async fn transition_status(
        &self,
        plan_id: &PlanId,
        expected: &[PlanStatus],
        next: PlanStatus,
        decision: Option<DecisionRecord>,
    ) -> AppResult<Plan>;

    /// Lists plans currently awaiting a confirmation or senior approval,
    /// oldest first.
    async fn list_awaiting_decision(&self) -> AppResult<Vec<Plan>>;
}

/// Durable keyed storage for execution records. Executions are immutable
/// except for the single rollback transition.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persists a finished execution attempt.
    async fn insert_execution(&self, execution: ExecutionRecord) -> AppResult<()>;

    /// Returns one execution by id. Executions are retained indefinitely.
    async fn find_execution(&self, execution_id: &ExecutionId) -> AppResult<Option<ExecutionRecord>>;

    /// Transitions an execution from `executed` to `rolled_back` with
    /// compare-and-swap semantics; fails with `AppError::Conflict` when the
    /// execution is not currently in `executed`.
    async fn mark_rolled_back(
        &self,
        execution_id: &ExecutionId,
        rolled_back_at: DateTime<Utc>,
    ) -> AppResult<ExecutionRecord>;
}
