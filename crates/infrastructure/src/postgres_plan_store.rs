use async_trait::async_trait;
use chrono::Utc;
use opsgate_application::PlanStore;
use opsgate_core::{AppError, AppResult, PlanId};
use opsgate_domain::{DecisionRecord, Plan, PlanStatus};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed plan store.
///
/// The full plan document lives in a JSONB column; the searchable fields are
/// mirrored into discrete columns. Status transitions run inside a
/// transaction with a row lock, giving the compare-and-swap semantics the
/// port requires.
#[derive(Clone)]
pub struct PostgresPlanStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct PlanRow {
    plan_json: Value,
}

fn plan_from_row(row: PlanRow) -> AppResult<Plan> {
    serde_json::from_value(row.plan_json)
        .map_err(|error| AppError::Internal(format!("failed to decode stored plan: {error}")))
}

impl PostgresPlanStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PostgresPlanStore {
    async fn insert_plan(&self, plan: Plan) -> AppResult<()> {
        let plan_json = serde_json::to_value(&plan)
            .map_err(|error| AppError::Internal(format!("failed to encode plan: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO governance_plans (
                plan_id,
                actor_subject,
                actor_role,
                module,
                intent_type,
                entity,
                risk_level,
                status,
                estimated_impact_count,
                plan_json,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(plan.plan_id.as_str())
        .bind(plan.actor.subject())
        .bind(plan.actor.role().as_str())
        .bind(plan.module.as_str())
        .bind(plan.intent.intent_type.as_str())
        .bind(plan.intent.entity.as_str())
        .bind(plan.risk_level.as_str())
        .bind(plan.status.as_str())
        .bind(i64::try_from(plan.estimated_impact_count).unwrap_or(i64::MAX))
        .bind(plan_json)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert plan '{}': {error}", plan.plan_id))
        })?;

        Ok(())
    }

    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<Plan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            "SELECT plan_json FROM governance_plans WHERE plan_id = $1",
        )
        .bind(plan_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load plan '{plan_id}': {error}"))
        })?;

        row.map(plan_from_row).transpose()
    }

    async fn transition_status(
        &self,
        plan_id: &PlanId,
        expected: &[PlanStatus],
        next: PlanStatus,
        decision: Option<DecisionRecord>,
    ) -> AppResult<Plan> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start plan transition transaction: {error}"
            ))
        })?;

        let row = sqlx::query_as::<_, PlanRow>(
            "SELECT plan_json FROM governance_plans WHERE plan_id = $1 FOR UPDATE",
        )
        .bind(plan_id.as_str())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to lock plan '{plan_id}': {error}"))
        })?;

        let Some(row) = row else {
            return Err(AppError::NotFound(format!("plan '{plan_id}' does not exist")));
        };
        let mut plan = plan_from_row(row)?;

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

        let plan_json = serde_json::to_value(&plan)
            .map_err(|error| AppError::Internal(format!("failed to encode plan: {error}")))?;

        sqlx::query(
            r#"
            UPDATE governance_plans
            SET status = $2, plan_json = $3, updated_at = $4
            WHERE plan_id = $1
            "#,
        )
        .bind(plan.plan_id.as_str())
        .bind(plan.status.as_str())
        .bind(plan_json)
        .bind(plan.updated_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to transition plan '{plan_id}': {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit plan transition for '{plan_id}': {error}"
            ))
        })?;

        Ok(plan)
    }

    async fn list_awaiting_decision(&self) -> AppResult<Vec<Plan>> {
        let rows = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT plan_json
            FROM governance_plans
            WHERE status = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(vec![
            PlanStatus::AwaitingConfirmation.as_str().to_owned(),
            PlanStatus::AwaitingSeniorApproval.as_str().to_owned(),
        ])
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list awaiting plans: {error}"))
        })?;

        rows.into_iter().map(plan_from_row).collect()
    }
}
