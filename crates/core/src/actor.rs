use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::AppError;

/// Role of an authenticated institutional actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Enrolled student; read-mostly access to academic records.
    Student,
    /// Teaching staff; limited writes inside their own department scope.
    Faculty,
    /// Administrative staff with full operational access.
    Admin,
}

impl ActorRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Faculty => "faculty",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for ActorRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Self::Student),
            "faculty" => Ok(Self::Faculty),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!(
                "unknown actor role '{value}'"
            ))),
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Actor identity captured on a plan at creation time.
///
/// Always a snapshot, never a live reference: permission re-evaluation during
/// the approval wait uses these values, so a role change mid-flight cannot
/// widen what an in-flight plan may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    subject: String,
    display_name: String,
    role: ActorRole,
    department: Option<String>,
}

impl ActorSnapshot {
    /// Creates an actor snapshot from authenticated identity data.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        role: ActorRole,
        department: Option<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            role,
            department,
        }
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the actor.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the actor role at snapshot time.
    #[must_use]
    pub fn role(&self) -> ActorRole {
        self.role
    }

    /// Returns the department scope, if the actor is bound to one.
    #[must_use]
    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    /// Returns the token used to detect privilege drift between plan
    /// creation and decision time. A decision presented with a token that no
    /// longer matches the snapshot is rejected as stale.
    #[must_use]
    pub fn freshness_token(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.subject.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.role.as_str().as_bytes());
        hasher.update([0x1f]);
        if let Some(department) = &self.department {
            hasher.update(department.as_bytes());
        }

        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ActorRole, ActorSnapshot};

    #[test]
    fn role_roundtrip_storage_value() {
        let role = ActorRole::Faculty;
        let restored = ActorRole::from_str(role.as_str());
        assert_eq!(restored.ok(), Some(role));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(ActorRole::from_str("registrar").is_err());
    }

    #[test]
    fn freshness_token_changes_with_role() {
        let before = ActorSnapshot::new("u-1", "Ada", ActorRole::Faculty, None);
        let after = ActorSnapshot::new("u-1", "Ada", ActorRole::Admin, None);
        assert_ne!(before.freshness_token(), after.freshness_token());
    }

    #[test]
    fn freshness_token_changes_with_department() {
        let before = ActorSnapshot::new(
            "u-1",
            "Ada",
            ActorRole::Faculty,
            Some("Computer Science".to_owned()),
        );
        let after = ActorSnapshot::new(
            "u-1",
            "Ada",
            ActorRole::Faculty,
            Some("Mathematics".to_owned()),
        );
        assert_ne!(before.freshness_token(), after.freshness_token());
    }

    #[test]
    fn freshness_token_is_stable_for_identical_snapshots() {
        let left = ActorSnapshot::new("u-9", "Grace", ActorRole::Admin, None);
        let right = ActorSnapshot::new("u-9", "Grace", ActorRole::Admin, None);
        assert_eq!(left.freshness_token(), right.freshness_token());
    }
}
