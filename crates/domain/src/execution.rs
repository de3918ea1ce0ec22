use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use opsgate_core::{AppError, ExecutionId, PlanId};
use serde::{Deserialize, Serialize};

use crate::{EntityKind, IntentType, RecordSnapshot};

/// Outcome state of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The operation applied successfully.
    Executed,
    /// The domain mutation failed; the attempted before-state is kept for
    /// forensics.
    Failed,
    /// The operation was reversed from captured snapshots.
    RolledBack,
}

impl ExecutionStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "executed" => Ok(Self::Executed),
            "failed" => Ok(Self::Failed),
            "rolled_back" => Ok(Self::RolledBack),
            other => Err(AppError::Validation(format!(
                "unknown execution status '{other}'"
            ))),
        }
    }
}

impl Display for ExecutionStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Record of applying (or failing to apply) one plan, including the
/// reversible snapshots captured around the mutation.
///
/// `before_state` and `after_state` are index-aligned and always equal in
/// length: a record absent on one side of the mutation is represented by a
/// tombstone snapshot at the matching index. Immutable once written, except
/// for the single rollback transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Opaque identifier.
    pub execution_id: ExecutionId,
    /// Plan this execution belongs to.
    pub plan_id: PlanId,
    /// Intent applied.
    pub intent_type: IntentType,
    /// Entity targeted.
    pub entity: EntityKind,
    /// Outcome state.
    pub status: ExecutionStatus,
    /// Per-record state captured before the mutation.
    pub before_state: Vec<RecordSnapshot>,
    /// Per-record state captured after the mutation, index-aligned with
    /// `before_state`.
    pub after_state: Vec<RecordSnapshot>,
    /// Number of records the operation touched.
    pub affected_count: u64,
    /// Failure detail when the mutation did not apply.
    pub error: Option<String>,
    /// Whether the captured snapshots can reverse this execution.
    pub supports_rollback: bool,
    /// Subject of the actor the execution ran for.
    pub executed_by: String,
    /// Execution timestamp.
    pub executed_at: DateTime<Utc>,
    /// Rollback timestamp once reversed.
    pub rolled_back_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Returns whether the snapshot sequences uphold the index-alignment
    /// invariant.
    #[must_use]
    pub fn snapshots_aligned(&self) -> bool {
        self.before_state.len() == self.after_state.len()
    }
}
