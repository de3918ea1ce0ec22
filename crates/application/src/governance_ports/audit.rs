use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgate_core::AppResult;
use opsgate_domain::{AuditEntry, IntentType, ModuleKind, RiskLevel};
use serde::{Deserialize, Serialize};

/// Hard cap on rows returned by one audit query.
pub const MAX_AUDIT_RESULTS: usize = 500;

/// Filter predicates for reading the audit ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Optional module filter.
    pub module: Option<ModuleKind>,
    /// Optional operation filter.
    pub operation_type: Option<IntentType>,
    /// Optional risk tier filter.
    pub risk_level: Option<RiskLevel>,
    /// Optional actor subject filter.
    pub actor_subject: Option<String>,
    /// Inclusive lower bound on the event timestamp.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the event timestamp.
    pub to: Option<DateTime<Utc>>,
    /// Maximum rows returned, clamped to [`MAX_AUDIT_RESULTS`].
    pub limit: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            module: None,
            operation_type: None,
            risk_level: None,
            actor_subject: None,
            from: None,
            to: None,
            limit: 100,
        }
    }
}

/// Aggregate counters for the governance dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceStats {
    /// Plans recorded in the ledger.
    pub total_plans: u64,
    /// Plans classified LOW.
    pub low_risk_plans: u64,
    /// Plans classified MEDIUM.
    pub medium_risk_plans: u64,
    /// Plans classified HIGH.
    pub high_risk_plans: u64,
    /// Plans per functional module.
    pub plans_by_module: BTreeMap<String, u64>,
    /// Successful executions.
    pub executed_total: u64,
    /// Failed executions.
    pub failed_total: u64,
    /// Rolled-back executions.
    pub rolled_back_total: u64,
    /// Plans currently awaiting a decision. Filled by the orchestrator, not
    /// by ledger implementations.
    pub pending_approvals: u64,
}

/// Append-only, queryable ledger of every lifecycle event.
///
/// Appends must never be skipped, even when the triggering operation failed:
/// audit completeness is a correctness property, not best-effort.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends one write-once entry.
    async fn append(&self, entry: AuditEntry) -> AppResult<()>;

    /// Returns matching entries, newest first, capped by the query limit.
    async fn query(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>>;

    /// Returns aggregate counters derived from the ledger.
    /// `pending_approvals` is left at zero.
    async fn stats(&self) -> AppResult<GovernanceStats>;
}
