use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use opsgate_application::PlanStore;
use opsgate_core::{AppError, AppResult, PlanId};
use opsgate_domain::{DecisionRecord, Plan, PlanStatus};
use tokio::sync::RwLock;

/// In-memory plan store implementation.
///
/// The compare-and-swap transition runs under one write lock, so concurrent
/// decisions on the same plan resolve to exactly one winner.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<String, Plan>>,
}

impl InMemoryPlanStore {
    /// Creates an empty in-memory plan store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn insert_plan(&self, plan: Plan) -> AppResult<()> {
        let mut plans = self.plans.write().await;

        if plans.contains_key(plan.plan_id.as_str()) {
            return Err(AppError::Conflict(format!(
                "plan '{}' already exists",
                plan.plan_id
            )));
        }

        plans.insert(plan.plan_id.as_str().to_owned(), plan);
        Ok(())
    }

    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<Plan>> {
        Ok(self.plans.read().await.get(plan_id.as_str()).cloned())
    }

    async fn transition_status(
        &self,
        plan_id: &PlanId,
        expected: &[PlanStatus],
        next: PlanStatus,
        decision: Option<DecisionRecord>,
    ) -> AppResult<Plan> {
        let mut plans = self.plans.write().await;
        let plan = plans
            .get_mut(plan_id.as_str())
            .ok_or_else(|| AppError::NotFound(format!("plan '{plan_id}' does not exist")))?;

        if !expected.contains(&plan.status) || !plan.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "plan '{plan_id}' cannot move to '{next}' from status '{}'",
                plan.status
            )));
        }

        plan.status = next;
        if decision.is_some() {
            plan.decision = decision;
        }
        plan.updated_at = Utc::now();

        Ok(plan.clone())
    }

    async fn list_awaiting_decision(&self) -> AppResult<Vec<Plan>> {
        let plans = self.plans.read().await;
        let mut awaiting: Vec<Plan> = plans
            .values()
            .filter(|plan| plan.status.is_awaiting_decision())
            .cloned()
            .collect();
        awaiting.sort_by_key(|plan| plan.created_at);

        Ok(awaiting)
    }
}
