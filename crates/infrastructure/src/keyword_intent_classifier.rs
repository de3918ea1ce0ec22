use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use opsgate_application::IntentClassifier;
use opsgate_core::AppResult;
use opsgate_domain::{EntityKind, IntentExtraction, IntentType, ModuleKind, RecordFilters};
use serde_json::{Value, json};

const CREATE_TOKENS: &[&str] = &["create", "add", "insert", "register", "new"];
const UPDATE_TOKENS: &[&str] = &["update", "modify", "change", "set"];
const DELETE_TOKENS: &[&str] = &["delete", "remove", "erase"];
const ANALYZE_TOKENS: &[&str] = &[
    "analyze", "analysis", "count", "average", "sum", "total", "trend", "trends",
];
const TIME_RANGE_TOKENS: &[&str] = &[
    "last", "between", "from", "since", "today", "week", "month", "year", "semester",
];

const BASE_CONFIDENCE: f64 = 0.9;
const MISSING_DETAIL_PENALTY: f64 = 0.2;

/// Deterministic keyword-based intent classifier.
///
/// Serves as the fallback when no upstream language-model classifier is
/// configured or reachable. It only understands explicit phrasing, so its
/// confidence drops below the clarification threshold whenever the command
/// leaves scope or values unstated.
#[derive(Debug, Clone, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    /// Creates the keyword classifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn detect_intent(message: &str) -> IntentType {
        let contains = |tokens: &[&str]| tokens.iter().any(|token| message.contains(token));

        if contains(CREATE_TOKENS) {
            IntentType::Create
        } else if contains(UPDATE_TOKENS) {
            IntentType::Update
        } else if contains(DELETE_TOKENS) {
            IntentType::Delete
        } else if contains(ANALYZE_TOKENS) {
            IntentType::Analyze
        } else {
            IntentType::Read
        }
    }

    fn detect_entity(message: &str) -> Option<EntityKind> {
        // Scan word by word so "students" resolves through the alias table
        // instead of accidentally matching inside unrelated words.
        tokenize(message)
            .into_iter()
            .find_map(|token| EntityKind::from_str(&token).ok())
    }

    fn extract_filters(message: &str, tokens: &[String]) -> RecordFilters {
        let mut filters = RecordFilters::default();

        for (index, token) in tokens.iter().enumerate() {
            if let Some(id) = token.strip_prefix('#') {
                if id.chars().all(|c| c.is_ascii_digit()) && !id.is_empty() {
                    filters.id = Some(id.to_owned());
                }
            } else if (token == "record" || token == "id")
                && let Some(next) = tokens.get(index + 1)
                && next.chars().all(|c| c.is_ascii_digit())
                && !next.is_empty()
            {
                filters.id = Some(next.clone());
            } else if token == "semester"
                && let Some(next) = tokens.get(index + 1)
                && let Ok(semester) = next.parse::<i32>()
            {
                filters.semester = Some(semester);
            }
        }

        // "... department Computer Science" takes the trailing words as the
        // department name.
        if let Some(position) = message.find("department ") {
            let name: String = message[position + "department ".len()..]
                .chars()
                .take_while(|c| c.is_alphabetic() || c.is_whitespace())
                .collect();
            let name = name.trim();
            if !name.is_empty() {
                filters.department = Some(name.to_owned());
            }
        }

        filters
    }

    fn extract_values(tokens: &[String]) -> BTreeMap<String, Value> {
        let mut values = BTreeMap::new();

        // "cgpa to 8.5" / "cgpa = 8.5" is the one value form the original
        // command set used; everything richer needs the upstream classifier.
        for (index, token) in tokens.iter().enumerate() {
            if token == "cgpa" {
                let candidate = match tokens.get(index + 1).map(String::as_str) {
                    Some("to" | "=") => tokens.get(index + 2),
                    _ => tokens.get(index + 1),
                };
                if let Some(candidate) = candidate
                    && let Ok(cgpa) = candidate.parse::<f64>()
                {
                    values.insert("cgpa".to_owned(), json!(cgpa));
                }
            }
        }

        values
    }
}

fn tokenize(message: &str) -> Vec<String> {
    message
        .split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '#' && c != '.' && c != '_')
                .to_owned()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(
        &self,
        command: &str,
        _module: Option<ModuleKind>,
        clarification: Option<&str>,
    ) -> AppResult<IntentExtraction> {
        let full = match clarification {
            Some(clarification) => format!("{command}\n{clarification}"),
            None => command.to_owned(),
        };
        let message = full.to_lowercase();
        let tokens = tokenize(&message);

        let intent = Self::detect_intent(&message);
        let entity = Self::detect_entity(&message);
        let filters = Self::extract_filters(&message, &tokens);
        let values = Self::extract_values(&tokens);

        let mut missing_fields = Vec::new();
        if entity.is_none() {
            missing_fields.push("entity".to_owned());
        }
        if matches!(intent, IntentType::Update | IntentType::Delete) && filters.is_empty() {
            missing_fields.push("scope".to_owned());
        }
        if matches!(intent, IntentType::Create | IntentType::Update) && values.is_empty() {
            missing_fields.push("affected_fields".to_owned());
        }
        if intent == IntentType::Analyze
            && message.contains("trend")
            && !TIME_RANGE_TOKENS.iter().any(|token| {
                tokens.iter().any(|candidate| candidate == token)
            })
        {
            missing_fields.push("time_range".to_owned());
        }

        let penalty = MISSING_DETAIL_PENALTY * missing_fields.len() as f64;
        let confidence = (BASE_CONFIDENCE - penalty).clamp(0.1, 0.99);

        let question = if missing_fields.is_empty() {
            None
        } else {
            Some(format!(
                "Please clarify the following details: {}.",
                missing_fields.join(", ")
            ))
        };

        Ok(IntentExtraction {
            intent: intent.as_str().to_owned(),
            entity: entity.map(|entity| entity.as_str().to_owned()).unwrap_or_default(),
            filters,
            affected_fields: values.keys().cloned().collect(),
            values,
            confidence,
            missing_fields,
            clarification_question: question,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use opsgate_application::IntentClassifier;

    use super::KeywordIntentClassifier;

    #[tokio::test]
    async fn delete_by_record_number_is_fully_classified() {
        let classifier = KeywordIntentClassifier::new();
        let extraction = classifier
            .classify("delete student record #5", None, None)
            .await
            .unwrap();

        assert_eq!(extraction.intent, "DELETE");
        assert_eq!(extraction.entity, "student");
        assert_eq!(extraction.filters.id.as_deref(), Some("5"));
        assert!(extraction.missing_fields.is_empty());
        assert!(extraction.confidence > 0.75);
    }

    #[tokio::test]
    async fn cgpa_update_extracts_value_and_semester_scope() {
        let classifier = KeywordIntentClassifier::new();
        let extraction = classifier
            .classify("update cgpa to 8.5 for semester 5 students", None, None)
            .await
            .unwrap();

        assert_eq!(extraction.intent, "UPDATE");
        assert_eq!(extraction.entity, "student");
        assert_eq!(extraction.filters.semester, Some(5));
        assert_eq!(extraction.values.get("cgpa"), Some(&serde_json::json!(8.5)));
        assert!(extraction.missing_fields.is_empty());
    }

    #[tokio::test]
    async fn trend_analysis_without_a_time_range_is_ambiguous() {
        let classifier = KeywordIntentClassifier::new();
        let extraction = classifier
            .classify("attendance trends", None, None)
            .await
            .unwrap();

        assert_eq!(extraction.intent, "ANALYZE");
        assert!(extraction
            .missing_fields
            .contains(&"time_range".to_owned()));
        assert!(extraction.confidence < 0.75);
        assert!(extraction.clarification_question.is_some());
    }

    #[tokio::test]
    async fn clarification_text_resolves_the_missing_range() {
        let classifier = KeywordIntentClassifier::new();
        let extraction = classifier
            .classify("attendance trends", None, Some("for the last semester"))
            .await
            .unwrap();

        assert!(extraction.missing_fields.is_empty());
        assert!(extraction.confidence > 0.75);
    }

    #[tokio::test]
    async fn unscoped_delete_reports_missing_scope() {
        let classifier = KeywordIntentClassifier::new();
        let extraction = classifier
            .classify("remove invoices", None, None)
            .await
            .unwrap();

        assert_eq!(extraction.intent, "DELETE");
        assert_eq!(extraction.entity, "invoice");
        assert!(extraction.missing_fields.contains(&"scope".to_owned()));
    }

    #[tokio::test]
    async fn plain_listing_defaults_to_read() {
        let classifier = KeywordIntentClassifier::new();
        let extraction = classifier
            .classify("show all students department computer science", None, None)
            .await
            .unwrap();

        assert_eq!(extraction.intent, "READ");
        assert_eq!(extraction.entity, "student");
        assert_eq!(
            extraction.filters.department.as_deref(),
            Some("computer science")
        );
    }
}
