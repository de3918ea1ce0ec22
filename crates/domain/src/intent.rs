use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use opsgate_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::EntityKind;

/// Operation category extracted from a natural-language command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    /// Read records without aggregation.
    Read,
    /// Aggregate or trend over records.
    Analyze,
    /// Create a record.
    Create,
    /// Modify existing records.
    Update,
    /// Remove existing records.
    Delete,
    /// Forward the request to a higher-privilege review queue.
    Escalate,
}

impl IntentType {
    /// Returns a stable storage value for this intent.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Analyze => "ANALYZE",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Escalate => "ESCALATE",
        }
    }

    /// Returns whether this intent changes institutional records.
    #[must_use]
    pub fn mutates(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

impl FromStr for IntentType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(Self::Read),
            "ANALYZE" => Ok(Self::Analyze),
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "ESCALATE" => Ok(Self::Escalate),
            other => Err(AppError::Validation(format!("unknown intent '{other}'"))),
        }
    }
}

impl Display for IntentType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Filter terms supported by the governed query surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilters {
    /// Exact record identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Semester filter for academic entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<i32>,
    /// Department name filter; doubles as the target scope for permission
    /// evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Additional field equality terms.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl RecordFilters {
    /// Returns whether no filter term is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.semester.is_none()
            && self.department.is_none()
            && self.fields.is_empty()
    }
}

/// Raw classifier output before normalization.
///
/// Deliberately loose: upstream classifiers return open maps with free-form
/// intent and entity names. The orchestrator normalizes this into
/// [`CommandIntent`] before anything downstream touches it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentExtraction {
    /// Free-form intent name, expected to match one of [`IntentType`].
    pub intent: String,
    /// Free-form entity name, expected to match one of [`EntityKind`].
    pub entity: String,
    /// Extracted filter terms.
    #[serde(default)]
    pub filters: RecordFilters,
    /// Extracted field values for CREATE/UPDATE intents.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// Field names the command proposes to change.
    #[serde(default)]
    pub affected_fields: Vec<String>,
    /// Classifier confidence in [0, 1].
    #[serde(default)]
    pub confidence: f64,
    /// Required details the classifier could not extract.
    #[serde(default)]
    pub missing_fields: Vec<String>,
    /// Question to present when clarification is needed.
    #[serde(default)]
    pub clarification_question: Option<String>,
}

/// Normalized command intent: the closed form consumed by permission
/// evaluation, risk classification and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandIntent {
    /// Operation category.
    pub intent_type: IntentType,
    /// Targeted entity.
    pub entity: EntityKind,
    /// Record selection terms.
    pub filters: RecordFilters,
    /// Proposed field values for mutating intents.
    pub values: BTreeMap<String, Value>,
    /// Field names the command proposes to change.
    pub affected_fields: Vec<String>,
    /// Classifier confidence in [0, 1], clamped.
    pub confidence: f64,
}

impl CommandIntent {
    /// Normalizes a raw extraction into the closed intent form.
    ///
    /// An unrecognized intent falls back to READ. An unrecognized entity is
    /// reported as a missing field so the clarification loop asks for it
    /// instead of guessing a target for a mutation. Returns the normalized
    /// intent together with the merged missing-field list.
    #[must_use]
    pub fn from_extraction(extraction: &IntentExtraction) -> (Self, Vec<String>) {
        let mut missing_fields = extraction.missing_fields.clone();

        let intent_type =
            IntentType::from_str(extraction.intent.as_str()).unwrap_or(IntentType::Read);
        let entity = match EntityKind::from_str(extraction.entity.as_str()) {
            Ok(entity) => entity,
            Err(_) => {
                missing_fields.push("entity".to_owned());
                EntityKind::Student
            }
        };

        let affected_fields = if extraction.affected_fields.is_empty() {
            extraction.values.keys().cloned().collect()
        } else {
            extraction.affected_fields.clone()
        };

        let intent = Self {
            intent_type,
            entity,
            filters: extraction.filters.clone(),
            values: extraction.values.clone(),
            affected_fields,
            confidence: extraction.confidence.clamp(0.0, 1.0),
        };

        (intent, missing_fields)
    }
}
