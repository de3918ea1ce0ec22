use std::str::FromStr;

use axum::Json;
use axum::extract::{Query, State};
use opsgate_application::{AuditQuery, GovernanceStats};
use opsgate_domain::{IntentType, ModuleKind, RiskLevel};

use crate::actor_context::ActorContext;
use crate::dto::{AuditEntryResponse, AuditHistoryParams};
use crate::error::ApiResult;
use crate::state::AppState;

/// Queries the audit trail with optional filters.
pub async fn audit_history_handler(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(params): Query<AuditHistoryParams>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let defaults = AuditQuery::default();
    let query = AuditQuery {
        module: params
            .module
            .as_deref()
            .map(ModuleKind::from_str)
            .transpose()?,
        operation_type: params
            .operation_type
            .as_deref()
            .map(IntentType::from_str)
            .transpose()?,
        risk_level: params
            .risk_level
            .as_deref()
            .map(RiskLevel::from_str)
            .transpose()?,
        actor_subject: params.actor,
        from: params.start_date,
        to: params.end_date,
        limit: params.limit.unwrap_or(defaults.limit),
    };

    let entries = state.governance_service.audit_history(&actor.0, query).await?;

    Ok(Json(entries.iter().map(AuditEntryResponse::from).collect()))
}

/// Returns aggregate governance counters for the dashboard.
pub async fn ops_stats_handler(
    State(state): State<AppState>,
    actor: ActorContext,
) -> ApiResult<Json<GovernanceStats>> {
    let stats = state.governance_service.stats(&actor.0).await?;

    Ok(Json(stats))
}
