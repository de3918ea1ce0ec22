use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgate_application::ExecutionStore;
use opsgate_core::{AppError, AppResult, ExecutionId};
use opsgate_domain::{ExecutionRecord, ExecutionStatus};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed execution store. Records are immutable except for the
/// rollback transition, which runs under a row lock.
#[derive(Clone)]
pub struct PostgresExecutionStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct ExecutionRow {
    execution_json: Value,
}

fn execution_from_row(row: ExecutionRow) -> AppResult<ExecutionRecord> {
    serde_json::from_value(row.execution_json)
        .map_err(|error| AppError::Internal(format!("failed to decode stored execution: {error}")))
}

impl PostgresExecutionStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PostgresExecutionStore {
    async fn insert_execution(&self, execution: ExecutionRecord) -> AppResult<()> {
        let execution_json = serde_json::to_value(&execution)
            .map_err(|error| AppError::Internal(format!("failed to encode execution: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO governance_executions (
                execution_id,
                plan_id,
                status,
                execution_json,
                executed_at
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(execution.execution_id.as_str())
        .bind(execution.plan_id.as_str())
        .bind(execution.status.as_str())
        .bind(execution_json)
        .bind(execution.executed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to insert execution '{}': {error}",
                execution.execution_id
            ))
        })?;

        Ok(())
    }

    async fn find_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> AppResult<Option<ExecutionRecord>> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            "SELECT execution_json FROM governance_executions WHERE execution_id = $1",
        )
        .bind(execution_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load execution '{execution_id}': {error}"
            ))
        })?;

        row.map(execution_from_row).transpose()
    }

    async fn mark_rolled_back(
        &self,
        execution_id: &ExecutionId,
        rolled_back_at: DateTime<Utc>,
    ) -> AppResult<ExecutionRecord> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start rollback transition transaction: {error}"
            ))
        })?;

        let row = sqlx::query_as::<_, ExecutionRow>(
            "SELECT execution_json FROM governance_executions WHERE execution_id = $1 FOR UPDATE",
        )
        .bind(execution_id.as_str())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to lock execution '{execution_id}': {error}"
            ))
        })?;

        let Some(row) = row else {
            return Err(AppError::NotFound(format!(
                "execution '{execution_id}' does not exist"
            )));
        };
        let mut execution = execution_from_row(row)?;

        if execution.status != ExecutionStatus::Executed {
            return Err(AppError::Conflict(format!(
                "execution '{execution_id}' cannot be rolled back from status '{}'",
                execution.status
            )));
        }

        execution.status = ExecutionStatus::RolledBack;
        execution.rolled_back_at = Some(rolled_back_at);

        let execution_json = serde_json::to_value(&execution)
            .map_err(|error| AppError::Internal(format!("failed to encode execution: {error}")))?;

        sqlx::query(
            r#"
            UPDATE governance_executions
            SET status = $2, execution_json = $3
            WHERE execution_id = $1
            "#,
        )
        .bind(execution.execution_id.as_str())
        .bind(execution.status.as_str())
        .bind(execution_json)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark execution '{execution_id}' rolled back: {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit rollback transition for '{execution_id}': {error}"
            ))
        })?;

        Ok(execution)
    }
}
