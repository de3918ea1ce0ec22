//! Opsgate API composition root.

#![forbid(unsafe_code)]

mod actor_context;
mod api_config;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use opsgate_application::{
    AuditLog, ExecutionStore, GovernanceService, IntentClassifier, PlanStore, TwoFactorVerifier,
};
use opsgate_core::AppError;
use opsgate_infrastructure::{
    ConsoleNotifier, HttpIntentClassifier, InMemoryAuditLog, InMemoryDomainGateway,
    InMemoryExecutionStore, InMemoryPlanStore, KeywordIntentClassifier, PostgresAuditLog,
    PostgresExecutionStore, PostgresPlanStore, StaticTwoFactorVerifier, TotpTwoFactorVerifier,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api_config::{ApiConfig, ClassifierConfig, StoreConfig, TwoFactorConfig};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;

    // The institutional record store is an external collaborator; the
    // in-memory gateway stands in for it in this deployment.
    let gateway = Arc::new(InMemoryDomainGateway::new());
    if config.seed_demo_data {
        dev_seed::seed_demo_records(&gateway).await;
    }

    let classifier: Arc<dyn IntentClassifier> = match &config.classifier {
        ClassifierConfig::Keyword => Arc::new(KeywordIntentClassifier::new()),
        ClassifierConfig::Http { endpoint } => {
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            Arc::new(HttpIntentClassifier::new(http_client, endpoint.clone()))
        }
    };

    let two_factor: Arc<dyn TwoFactorVerifier> = match &config.two_factor {
        TwoFactorConfig::Static { code } => Arc::new(StaticTwoFactorVerifier::new(code.clone())),
        TwoFactorConfig::Totp { issuer, secrets } => {
            let verifier = TotpTwoFactorVerifier::new(issuer.clone());
            for (subject, encoded) in secrets {
                verifier
                    .register_base32(subject.clone(), encoded.clone())
                    .await?;
            }
            Arc::new(verifier)
        }
    };

    let (plan_store, execution_store, audit_log): (
        Arc<dyn PlanStore>,
        Arc<dyn ExecutionStore>,
        Arc<dyn AuditLog>,
    ) = match &config.store {
        StoreConfig::Memory => {
            if config.migrate_only {
                return Err(AppError::Validation(
                    "the migrate command requires OPS_STORE=postgres".to_owned(),
                ));
            }
            (
                Arc::new(InMemoryPlanStore::new()),
                Arc::new(InMemoryExecutionStore::new()),
                Arc::new(InMemoryAuditLog::new()),
            )
        }
        StoreConfig::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to connect to database: {error}"))
                })?;

            sqlx::migrate!("../../crates/infrastructure/migrations")
                .run(&pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to run migrations: {error}"))
                })?;

            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }

            (
                Arc::new(PostgresPlanStore::new(pool.clone())),
                Arc::new(PostgresExecutionStore::new(pool.clone())),
                Arc::new(PostgresAuditLog::new(pool)),
            )
        }
    };

    let governance_service = GovernanceService::new(
        classifier,
        gateway,
        plan_store,
        execution_store,
        audit_log,
        two_factor,
        config.policy.clone(),
    )
    .with_notifier(Arc::new(ConsoleNotifier::new()));

    let app_state = AppState { governance_service };

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/api/ops/plan", post(handlers::ops::submit_plan_handler))
        .route(
            "/api/ops/decision",
            post(handlers::ops::submit_decision_handler),
        )
        .route("/api/ops/execute", post(handlers::ops::execute_plan_handler))
        .route(
            "/api/ops/rollback",
            post(handlers::ops::rollback_execution_handler),
        )
        .route("/api/ops/plans/{plan_id}", get(handlers::ops::get_plan_handler))
        .route(
            "/api/ops/pending",
            get(handlers::ops::pending_approvals_handler),
        )
        .route("/api/ops/audit", get(handlers::audit::audit_history_handler))
        .route("/api/ops/stats", get(handlers::audit::ops_stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "opsgate-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
