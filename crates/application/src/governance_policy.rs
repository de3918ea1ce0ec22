use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use opsgate_core::{ActorRole, AppError};
use opsgate_domain::RiskThresholds;

/// Gate behavior of the governance pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Full gating: confirmation for MEDIUM, senior approval plus a second
    /// factor for HIGH.
    Gated,
    /// Degenerate configuration: every plan routes as LOW risk and executes
    /// immediately; the audit trail is the only control left.
    AuditOnly,
}

impl GateMode {
    /// Returns a stable configuration value for this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gated => "gated",
            Self::AuditOnly => "audit_only",
        }
    }
}

impl FromStr for GateMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "gated" => Ok(Self::Gated),
            "audit_only" => Ok(Self::AuditOnly),
            other => Err(AppError::Validation(format!(
                "unknown gate mode '{other}'"
            ))),
        }
    }
}

/// Tunable governance knobs, loaded from the environment by the composition
/// root and fixed for the lifetime of the service.
#[derive(Debug, Clone)]
pub struct GovernancePolicy {
    /// Classifier confidence below this value pauses the plan for
    /// clarification.
    pub confidence_threshold: f64,
    /// Maximum number of records returned in an impact preview.
    pub max_preview_rows: usize,
    /// Impact-count bucket boundaries for risk classification.
    pub risk_thresholds: RiskThresholds,
    /// Roles allowed to decide HIGH-risk plans, see pending approvals and
    /// read the full audit trail.
    pub senior_roles: BTreeSet<ActorRole>,
    /// Gate behavior.
    pub gate_mode: GateMode,
    /// Upper bound on waiting for an upstream intent classification.
    pub classification_timeout: Duration,
    /// Upper bound on the impact estimation query.
    pub estimation_timeout: Duration,
}

impl Default for GovernancePolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.75,
            max_preview_rows: 50,
            risk_thresholds: RiskThresholds::default(),
            senior_roles: BTreeSet::from([ActorRole::Admin]),
            gate_mode: GateMode::Gated,
            classification_timeout: Duration::from_secs(15),
            estimation_timeout: Duration::from_secs(5),
        }
    }
}

impl GovernancePolicy {
    /// Returns whether the role may decide HIGH-risk plans.
    #[must_use]
    pub fn is_senior(&self, role: ActorRole) -> bool {
        self.senior_roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use opsgate_core::ActorRole;

    use super::{GateMode, GovernancePolicy};

    #[test]
    fn gate_mode_roundtrip_configuration_value() {
        for mode in [GateMode::Gated, GateMode::AuditOnly] {
            assert_eq!(GateMode::from_str(mode.as_str()).ok(), Some(mode));
        }
    }

    #[test]
    fn default_policy_treats_admin_as_senior() {
        let policy = GovernancePolicy::default();
        assert!(policy.is_senior(ActorRole::Admin));
        assert!(!policy.is_senior(ActorRole::Faculty));
    }
}
