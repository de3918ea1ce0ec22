//! Application layer for Opsgate: collaborator ports and the governance
//! orchestrator that drives the plan lifecycle end to end.

#![forbid(unsafe_code)]

mod governance_policy;
mod governance_ports;
mod governance_service;
mod impact_estimator;

pub use governance_policy::{GateMode, GovernancePolicy};
pub use governance_ports::{
    AuditLog, AuditQuery, ClarificationRequest, DecisionInput, DecisionOutcome, DomainDataGateway,
    DomainMutation, ExecutionOutcome, ExecutionStore, GovernanceNotification, GovernanceStats,
    IntentClassifier, MAX_AUDIT_RESULTS, Notifier, NotificationKind, PlanStore,
    SubmitCommandInput, SubmittedPlan, TwoFactorVerifier,
};
pub use governance_service::GovernanceService;
pub use impact_estimator::ImpactEstimator;
