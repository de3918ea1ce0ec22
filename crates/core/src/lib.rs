//! Shared primitives for all Rust crates in Opsgate.

#![forbid(unsafe_code)]

/// Actor identity primitives shared across services.
pub mod actor;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use actor::{ActorRole, ActorSnapshot};

/// Result type used across Opsgate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Opaque identifier assigned to one governed operational plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
    /// Creates a fresh plan identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("plan_{}", short_token(12)))
    }

    /// Creates a plan identifier from a stored value.
    pub fn from_string(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "plan id must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying identifier value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PlanId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Opaque identifier assigned to one execution attempt of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Creates a fresh execution identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("exec_{}", short_token(12)))
    }

    /// Creates an execution identifier from a stored value.
    pub fn from_string(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "execution id must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying identifier value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ExecutionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

fn short_token(length: usize) -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(length);
    token
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state, including a decision
    /// raced against another decision on the same plan.
    #[error("conflict: {0}")]
    Conflict(String),

    /// User is not authenticated or a required second factor is missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but blocked by governance policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The actor's privileges changed between plan creation and decision.
    #[error("stale actor: {0}")]
    StaleActor(String),

    /// The execution captured no reversible state for this operation.
    #[error("rollback unsupported: {0}")]
    RollbackUnsupported(String),

    /// The domain mutation itself failed; the outcome is recorded, never
    /// retried automatically.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{ExecutionId, NonEmptyString, PlanId};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn plan_id_carries_prefix() {
        let plan_id = PlanId::generate();
        assert!(plan_id.as_str().starts_with("plan_"));
        assert_eq!(plan_id.as_str().len(), "plan_".len() + 12);
    }

    #[test]
    fn execution_id_carries_prefix() {
        let execution_id = ExecutionId::generate();
        assert!(execution_id.as_str().starts_with("exec_"));
    }

    #[test]
    fn stored_id_must_not_be_blank() {
        assert!(PlanId::from_string(" ").is_err());
        assert!(ExecutionId::from_string("exec_0011223344aa").is_ok());
    }
}
