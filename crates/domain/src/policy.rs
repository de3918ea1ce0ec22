use std::fmt::{Display, Formatter};
use std::str::FromStr;

use opsgate_core::{ActorRole, ActorSnapshot, AppError};
use serde::{Deserialize, Serialize};

use crate::{EntityKind, IntentType};

/// Machine-readable reason attached to a permission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionReason {
    /// The command is allowed.
    Ok,
    /// The role matrix does not grant this intent on this entity.
    RoleRestricted,
    /// The target scope lies outside the actor's department.
    DepartmentScopeRestricted,
    /// Student records are write-protected from every non-admin role.
    StudentWriteRestricted,
}

impl PermissionReason {
    /// Returns a stable storage value for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::RoleRestricted => "ROLE_RESTRICTED",
            Self::DepartmentScopeRestricted => "DEPARTMENT_SCOPE_RESTRICTED",
            Self::StudentWriteRestricted => "STUDENT_WRITE_RESTRICTED",
        }
    }
}

impl FromStr for PermissionReason {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OK" => Ok(Self::Ok),
            "ROLE_RESTRICTED" => Ok(Self::RoleRestricted),
            "DEPARTMENT_SCOPE_RESTRICTED" => Ok(Self::DepartmentScopeRestricted),
            "STUDENT_WRITE_RESTRICTED" => Ok(Self::StudentWriteRestricted),
            other => Err(AppError::Validation(format!(
                "unknown permission reason '{other}'"
            ))),
        }
    }
}

impl Display for PermissionReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Outcome of evaluating one actor/intent/entity/scope combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    /// Whether the command may proceed.
    pub allowed: bool,
    /// Reason backing the decision.
    pub reason: PermissionReason,
    /// Whether a denied command should be offered the escalation path.
    pub escalation_required: bool,
}

impl PermissionDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: PermissionReason::Ok,
            escalation_required: false,
        }
    }

    fn deny(reason: PermissionReason) -> Self {
        Self {
            allowed: false,
            reason,
            escalation_required: true,
        }
    }
}

/// Declarative role × intent × entity access matrix.
fn role_allows(role: ActorRole, intent_type: IntentType, entity: EntityKind) -> bool {
    use EntityKind::{Attendance, Course, Department, Prediction, Student};

    match role {
        ActorRole::Admin => true,
        ActorRole::Student => match intent_type {
            IntentType::Read => {
                matches!(entity, Student | Course | Department | Attendance | Prediction)
            }
            IntentType::Analyze => matches!(entity, Attendance | Prediction),
            IntentType::Update => matches!(entity, Student),
            IntentType::Escalate => true,
            IntentType::Create | IntentType::Delete => false,
        },
        ActorRole::Faculty => match intent_type {
            IntentType::Read => {
                matches!(entity, Student | Course | Department | Attendance | Prediction)
            }
            IntentType::Analyze => matches!(entity, Student | Course | Attendance | Prediction),
            IntentType::Create => matches!(entity, Attendance),
            IntentType::Update => matches!(entity, Attendance | Course),
            IntentType::Escalate => true,
            IntentType::Delete => false,
        },
    }
}

/// Evaluates permission for one command.
///
/// Pure and side-effect free. Called fresh at plan creation and again at
/// decision time; results are never cached across the approval wait.
#[must_use]
pub fn evaluate_permission(
    actor: &ActorSnapshot,
    intent_type: IntentType,
    entity: EntityKind,
    target_department: Option<&str>,
) -> PermissionDecision {
    // Student master records are write-protected from every non-admin role,
    // regardless of what the role matrix would otherwise grant.
    if entity == EntityKind::Student && intent_type.mutates() && actor.role() != ActorRole::Admin {
        return PermissionDecision::deny(PermissionReason::StudentWriteRestricted);
    }

    if !role_allows(actor.role(), intent_type, entity) {
        return PermissionDecision::deny(PermissionReason::RoleRestricted);
    }

    if matches!(actor.role(), ActorRole::Student | ActorRole::Faculty)
        && let (Some(own), Some(target)) = (actor.department(), target_department)
        && !own.eq_ignore_ascii_case(target)
    {
        return PermissionDecision::deny(PermissionReason::DepartmentScopeRestricted);
    }

    PermissionDecision::allow()
}

#[cfg(test)]
mod tests {
    use opsgate_core::{ActorRole, ActorSnapshot};

    use super::{PermissionReason, evaluate_permission};
    use crate::{EntityKind, IntentType};

    fn actor(role: ActorRole, department: Option<&str>) -> ActorSnapshot {
        ActorSnapshot::new("u-1", "Test Actor", role, department.map(str::to_owned))
    }

    #[test]
    fn faculty_cannot_delete_student_records() {
        let decision = evaluate_permission(
            &actor(ActorRole::Faculty, Some("Computer Science")),
            IntentType::Delete,
            EntityKind::Student,
            None,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, PermissionReason::StudentWriteRestricted);
        assert!(decision.escalation_required);
    }

    #[test]
    fn student_update_of_own_record_is_still_write_restricted() {
        let decision = evaluate_permission(
            &actor(ActorRole::Student, Some("Computer Science")),
            IntentType::Update,
            EntityKind::Student,
            None,
        );
        assert_eq!(decision.reason, PermissionReason::StudentWriteRestricted);
    }

    #[test]
    fn faculty_reads_inside_their_department() {
        let decision = evaluate_permission(
            &actor(ActorRole::Faculty, Some("Computer Science")),
            IntentType::Read,
            EntityKind::Student,
            Some("computer science"),
        );
        assert!(decision.allowed);
        assert_eq!(decision.reason, PermissionReason::Ok);
    }

    #[test]
    fn faculty_reads_outside_their_department_are_scope_restricted() {
        let decision = evaluate_permission(
            &actor(ActorRole::Faculty, Some("Computer Science")),
            IntentType::Read,
            EntityKind::Student,
            Some("Mathematics"),
        );
        assert_eq!(decision.reason, PermissionReason::DepartmentScopeRestricted);
    }

    #[test]
    fn student_cannot_read_payroll() {
        let decision = evaluate_permission(
            &actor(ActorRole::Student, None),
            IntentType::Read,
            EntityKind::SalaryRecord,
            None,
        );
        assert_eq!(decision.reason, PermissionReason::RoleRestricted);
    }

    #[test]
    fn admin_is_unrestricted_across_entities() {
        for entity in EntityKind::all() {
            let decision = evaluate_permission(
                &actor(ActorRole::Admin, None),
                IntentType::Delete,
                *entity,
                Some("Mathematics"),
            );
            assert!(decision.allowed, "admin denied on {entity}");
        }
    }

    #[test]
    fn escalate_is_always_permitted() {
        let decision = evaluate_permission(
            &actor(ActorRole::Student, None),
            IntentType::Escalate,
            EntityKind::SalaryRecord,
            None,
        );
        assert!(decision.allowed);
    }
}
