use async_trait::async_trait;
use opsgate_application::{AuditLog, AuditQuery, GovernanceStats, MAX_AUDIT_RESULTS};
use opsgate_core::{AppError, AppResult};
use opsgate_domain::{AuditEntry, RiskLevel};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed append-only audit log. Rows are inserted once and never
/// updated or deleted.
#[derive(Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct AuditRow {
    entry_json: Value,
}

#[derive(Debug, FromRow)]
struct PlanCountRow {
    risk_level: String,
    module: String,
    plan_count: i64,
}

#[derive(Debug, FromRow)]
struct OutcomeCountRow {
    event_type: String,
    outcome_count: i64,
}

fn entry_from_row(row: AuditRow) -> AppResult<AuditEntry> {
    serde_json::from_value(row.entry_json).map_err(|error| {
        AppError::Internal(format!("failed to decode stored audit entry: {error}"))
    })
}

impl PostgresAuditLog {
    /// Creates a log with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        let entry_json = serde_json::to_value(&entry).map_err(|error| {
            AppError::Internal(format!("failed to encode audit entry: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO governance_audit_entries (
                event_id,
                event_type,
                plan_id,
                execution_id,
                actor_subject,
                actor_role,
                risk_level,
                operation_type,
                module,
                entry_json,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.event_id.as_str())
        .bind(entry.event_type.as_str())
        .bind(entry.plan_id.as_str())
        .bind(entry.execution_id.as_ref().map(|id| id.as_str().to_owned()))
        .bind(entry.actor_subject.as_str())
        .bind(entry.actor_role.as_str())
        .bind(entry.risk_level.as_str())
        .bind(entry.operation_type.as_str())
        .bind(entry.module.as_str())
        .bind(entry_json)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append audit entry '{}': {error}",
                entry.event_id
            ))
        })?;

        Ok(())
    }

    async fn query(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        let limit = query.limit.min(MAX_AUDIT_RESULTS);
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT entry_json
            FROM governance_audit_entries
            WHERE ($1::TEXT IS NULL OR module = $1)
              AND ($2::TEXT IS NULL OR operation_type = $2)
              AND ($3::TEXT IS NULL OR risk_level = $3)
              AND ($4::TEXT IS NULL OR actor_subject = $4)
              AND ($5::TIMESTAMPTZ IS NULL OR created_at >= $5)
              AND ($6::TIMESTAMPTZ IS NULL OR created_at <= $6)
            ORDER BY created_at DESC
            LIMIT $7
            "#,
        )
        .bind(query.module.map(|module| module.as_str().to_owned()))
        .bind(
            query
                .operation_type
                .map(|operation| operation.as_str().to_owned()),
        )
        .bind(query.risk_level.map(|risk| risk.as_str().to_owned()))
        .bind(query.actor_subject)
        .bind(query.from)
        .bind(query.to)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to query audit log: {error}")))?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn stats(&self) -> AppResult<GovernanceStats> {
        let plan_counts = sqlx::query_as::<_, PlanCountRow>(
            r#"
            SELECT risk_level, module, COUNT(*) AS plan_count
            FROM governance_audit_entries
            WHERE event_type = 'created'
            GROUP BY risk_level, module
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to aggregate plan counts: {error}"))
        })?;

        let outcome_counts = sqlx::query_as::<_, OutcomeCountRow>(
            r#"
            SELECT event_type, COUNT(*) AS outcome_count
            FROM governance_audit_entries
            WHERE event_type IN ('executed', 'failed', 'rollback')
            GROUP BY event_type
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to aggregate outcome counts: {error}"))
        })?;

        let mut stats = GovernanceStats::default();
        for row in plan_counts {
            let count = u64::try_from(row.plan_count).unwrap_or_default();
            stats.total_plans += count;
            match row.risk_level.parse::<RiskLevel>() {
                Ok(RiskLevel::Low) => stats.low_risk_plans += count,
                Ok(RiskLevel::Medium) => stats.medium_risk_plans += count,
                Ok(RiskLevel::High) => stats.high_risk_plans += count,
                Err(_) => {}
            }
            *stats.plans_by_module.entry(row.module).or_default() += count;
        }
        for row in outcome_counts {
            let count = u64::try_from(row.outcome_count).unwrap_or_default();
            match row.event_type.as_str() {
                "executed" => stats.executed_total = count,
                "failed" => stats.failed_total = count,
                "rollback" => stats.rolled_back_total = count,
                _ => {}
            }
        }

        Ok(stats)
    }
}
