use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use opsgate_application::{DecisionInput, SubmitCommandInput};
use opsgate_core::{ExecutionId, PlanId};
use opsgate_domain::{DecisionKind, ModuleKind};

use crate::actor_context::ActorContext;
use crate::dto::{
    DecideResponse, DecisionRequest, ExecuteRequest, ExecutionOutcomeResponse, ExecutionResponse,
    PlanResponse, RollbackRequest, SubmitPlanRequest, SubmitPlanResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Submits a natural-language command and returns the resulting plan.
pub async fn submit_plan_handler(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(request): Json<SubmitPlanRequest>,
) -> ApiResult<Json<SubmitPlanResponse>> {
    let module = request
        .module
        .as_deref()
        .map(ModuleKind::from_str)
        .transpose()?;

    let submitted = state
        .governance_service
        .submit_command(
            &actor.0,
            SubmitCommandInput {
                command: request.message,
                module,
                clarification: request.clarification,
            },
        )
        .await?;

    Ok(Json(SubmitPlanResponse::from(&submitted)))
}

/// Records an APPROVE/REJECT/ESCALATE decision on a gated plan.
pub async fn submit_decision_handler(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<Json<DecideResponse>> {
    let input = DecisionInput {
        plan_id: PlanId::from_string(request.plan_id)?,
        decision: DecisionKind::from_str(request.decision.as_str())?,
        comment: request.comment,
        two_factor_code: request.two_factor_code,
        actor_token: request.actor_token,
    };

    let outcome = state.governance_service.decide(&actor.0, input).await?;

    Ok(Json(DecideResponse {
        plan: PlanResponse::from(&outcome.plan),
        execution: outcome.execution.as_ref().map(ExecutionResponse::from),
    }))
}

/// Executes an approved (or auto-executable) plan.
pub async fn execute_plan_handler(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecutionOutcomeResponse>> {
    let plan_id = PlanId::from_string(request.plan_id)?;
    let outcome = state
        .governance_service
        .execute_plan(&actor.0, &plan_id)
        .await?;

    Ok(Json(ExecutionOutcomeResponse {
        plan: PlanResponse::from(&outcome.plan),
        execution: ExecutionResponse::from(&outcome.execution),
    }))
}

/// Reverses an executed mutation from its captured snapshots.
pub async fn rollback_execution_handler(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(request): Json<RollbackRequest>,
) -> ApiResult<Json<ExecutionOutcomeResponse>> {
    let execution_id = ExecutionId::from_string(request.execution_id)?;
    let outcome = state
        .governance_service
        .rollback_execution(&actor.0, &execution_id)
        .await?;

    Ok(Json(ExecutionOutcomeResponse {
        plan: PlanResponse::from(&outcome.plan),
        execution: ExecutionResponse::from(&outcome.execution),
    }))
}

/// Returns one plan by id.
pub async fn get_plan_handler(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(plan_id): Path<String>,
) -> ApiResult<Json<PlanResponse>> {
    let plan_id = PlanId::from_string(plan_id)?;
    let plan = state.governance_service.plan(&plan_id).await?;

    Ok(Json(PlanResponse::from(&plan)))
}

/// Lists plans awaiting a decision. Non-senior actors receive an empty list.
pub async fn pending_approvals_handler(
    State(state): State<AppState>,
    actor: ActorContext,
) -> ApiResult<Json<Vec<PlanResponse>>> {
    let pending = state.governance_service.pending_approvals(&actor.0).await?;

    Ok(Json(pending.iter().map(PlanResponse::from).collect()))
}
