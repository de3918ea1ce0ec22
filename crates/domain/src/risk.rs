use std::fmt::{Display, Formatter};
use std::str::FromStr;

use opsgate_core::AppError;
use serde::{Deserialize, Serialize};

use crate::{EntityKind, IntentType};

/// Field names whose modification always forces HIGH risk.
const HIGH_RISK_FIELDS: &[&str] = &[
    "salary",
    "base_salary",
    "gross_salary",
    "net_salary",
    "tax_rate",
];

/// Gate tier assigned to one plan, immutable after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Auto-executable.
    Low,
    /// Requires an explicit confirmation.
    Medium,
    /// Requires senior approval and a verified second factor.
    High,
}

impl RiskLevel {
    /// Returns a stable storage value for this tier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(AppError::Validation(format!(
                "unknown risk level '{other}'"
            ))),
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Impact-count bucket boundaries for risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Impact counts above this value classify at least MEDIUM.
    pub medium_impact: u64,
    /// Impact counts above this value classify HIGH.
    pub high_impact: u64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium_impact: 10,
            high_impact: 50,
        }
    }
}

/// Classifies one operation into a risk tier.
///
/// Deterministic over its inputs so a stored plan re-derives the same tier
/// during audit replay. Signals combine by monotonic max: any single
/// high-severity signal forces the overall tier up, lower signals never pull
/// it down. A zero-impact mutation is coerced to LOW since there is nothing
/// to confirm.
#[must_use]
pub fn classify_risk(
    intent_type: IntentType,
    entity: EntityKind,
    estimated_impact_count: u64,
    affected_fields: &[String],
    thresholds: &RiskThresholds,
) -> RiskLevel {
    if !intent_type.mutates() {
        return RiskLevel::Low;
    }

    if estimated_impact_count == 0 {
        return RiskLevel::Low;
    }

    let mut tier = match intent_type {
        IntentType::Delete if estimated_impact_count > 1 => RiskLevel::High,
        IntentType::Delete | IntentType::Create | IntentType::Update => RiskLevel::Medium,
        IntentType::Read | IntentType::Analyze | IntentType::Escalate => RiskLevel::Low,
    };

    if entity.is_ledger() {
        tier = tier.max(RiskLevel::Medium);
    }

    if affected_fields
        .iter()
        .any(|field| HIGH_RISK_FIELDS.contains(&field.as_str()))
    {
        tier = tier.max(RiskLevel::High);
    }

    if estimated_impact_count > thresholds.high_impact {
        tier = tier.max(RiskLevel::High);
    } else if estimated_impact_count > thresholds.medium_impact {
        tier = tier.max(RiskLevel::Medium);
    }

    tier
}

/// Gating flags derived from a classified tier, fixed at classification time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatingRequirements {
    /// Plan must be confirmed by its actor before execution.
    pub requires_confirmation: bool,
    /// Plan must be approved by a senior reviewer before execution.
    pub requires_senior_approval: bool,
    /// Decision must carry a verified second factor.
    pub requires_2fa: bool,
}

impl GatingRequirements {
    /// Derives gates from risk tier, intent and entity sensitivity.
    ///
    /// HIGH always requires senior approval plus a second factor. MEDIUM
    /// requires confirmation only. LOW runs ungated unless it mutates a
    /// sensitive entity with a non-zero impact, which keeps the confirmation
    /// gate; read-only intents on sensitive entities stay auto-executable.
    #[must_use]
    pub fn derive(
        risk_level: RiskLevel,
        intent_type: IntentType,
        entity: EntityKind,
        estimated_impact_count: u64,
    ) -> Self {
        match risk_level {
            RiskLevel::High => Self {
                requires_confirmation: false,
                requires_senior_approval: true,
                requires_2fa: true,
            },
            RiskLevel::Medium => Self {
                requires_confirmation: true,
                requires_senior_approval: false,
                requires_2fa: false,
            },
            RiskLevel::Low => Self {
                requires_confirmation: intent_type.mutates()
                    && estimated_impact_count > 0
                    && entity.is_sensitive(),
                requires_senior_approval: false,
                requires_2fa: false,
            },
        }
    }

    /// Gate-free requirements used by the audit-only degenerate mode.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns whether the plan may execute without any human decision.
    #[must_use]
    pub fn auto_executable(&self) -> bool {
        !self.requires_confirmation && !self.requires_senior_approval
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{GatingRequirements, RiskLevel, RiskThresholds, classify_risk};
    use crate::{EntityKind, IntentType};

    fn any_intent() -> impl Strategy<Value = IntentType> {
        prop_oneof![
            Just(IntentType::Read),
            Just(IntentType::Analyze),
            Just(IntentType::Create),
            Just(IntentType::Update),
            Just(IntentType::Delete),
            Just(IntentType::Escalate),
        ]
    }

    fn any_entity() -> impl Strategy<Value = EntityKind> {
        prop::sample::select(EntityKind::all().to_vec())
    }

    #[test]
    fn read_and_analyze_are_always_low() {
        let thresholds = RiskThresholds::default();
        for entity in EntityKind::all() {
            assert_eq!(
                classify_risk(IntentType::Read, *entity, 5_000, &[], &thresholds),
                RiskLevel::Low
            );
            assert_eq!(
                classify_risk(IntentType::Analyze, *entity, 5_000, &[], &thresholds),
                RiskLevel::Low
            );
        }
    }

    #[test]
    fn bulk_delete_is_high_and_single_delete_is_medium() {
        let thresholds = RiskThresholds::default();
        assert_eq!(
            classify_risk(IntentType::Delete, EntityKind::Course, 2, &[], &thresholds),
            RiskLevel::High
        );
        assert_eq!(
            classify_risk(IntentType::Delete, EntityKind::Course, 1, &[], &thresholds),
            RiskLevel::Medium
        );
    }

    #[test]
    fn salary_field_update_forces_high() {
        let thresholds = RiskThresholds::default();
        let fields = vec!["net_salary".to_owned()];
        assert_eq!(
            classify_risk(
                IntentType::Update,
                EntityKind::SalaryRecord,
                1,
                &fields,
                &thresholds
            ),
            RiskLevel::High
        );
    }

    #[test]
    fn bulk_update_crosses_impact_buckets() {
        let thresholds = RiskThresholds::default();
        assert_eq!(
            classify_risk(IntentType::Update, EntityKind::Course, 11, &[], &thresholds),
            RiskLevel::Medium
        );
        assert_eq!(
            classify_risk(IntentType::Update, EntityKind::Course, 51, &[], &thresholds),
            RiskLevel::High
        );
    }

    #[test]
    fn zero_impact_mutation_is_coerced_low() {
        let thresholds = RiskThresholds::default();
        assert_eq!(
            classify_risk(
                IntentType::Delete,
                EntityKind::SalaryRecord,
                0,
                &[],
                &thresholds
            ),
            RiskLevel::Low
        );
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(
            intent in any_intent(),
            entity in any_entity(),
            impact in 0_u64..10_000,
            fields in prop::collection::vec("[a-z_]{1,12}", 0..4),
        ) {
            let thresholds = RiskThresholds::default();
            let first = classify_risk(intent, entity, impact, &fields, &thresholds);
            let second = classify_risk(intent, entity, impact, &fields, &thresholds);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn high_always_gates_senior_and_2fa(
            intent in any_intent(),
            entity in any_entity(),
            impact in 0_u64..10_000,
            fields in prop::collection::vec("[a-z_]{1,12}", 0..4),
        ) {
            let thresholds = RiskThresholds::default();
            let risk = classify_risk(intent, entity, impact, &fields, &thresholds);
            let gates = GatingRequirements::derive(risk, intent, entity, impact);

            match risk {
                RiskLevel::High => {
                    prop_assert!(gates.requires_senior_approval);
                    prop_assert!(gates.requires_2fa);
                }
                RiskLevel::Medium => {
                    prop_assert!(gates.requires_confirmation);
                    prop_assert!(!gates.requires_senior_approval);
                    prop_assert!(!gates.requires_2fa);
                }
                RiskLevel::Low => {
                    prop_assert!(!gates.requires_senior_approval);
                    prop_assert!(!gates.requires_2fa);
                }
            }
        }

        #[test]
        fn read_only_low_plans_are_auto_executable(
            entity in any_entity(),
            impact in 0_u64..10_000,
        ) {
            let thresholds = RiskThresholds::default();
            let risk = classify_risk(IntentType::Read, entity, impact, &[], &thresholds);
            let gates = GatingRequirements::derive(risk, IntentType::Read, entity, impact);
            prop_assert_eq!(risk, RiskLevel::Low);
            prop_assert!(gates.auto_executable());
        }
    }
}
