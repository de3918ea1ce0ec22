use async_trait::async_trait;
use opsgate_core::AppResult;
use opsgate_domain::{IntentExtraction, ModuleKind};

/// External natural-language intent classifier.
///
/// Intent understanding is not computed here; this port consumes a pluggable
/// upstream classifier and treats its confidence as an input.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Extracts a structured intent from a raw command. A prior clarification
    /// is appended to the command context when the actor resubmits.
    async fn classify(
        &self,
        command: &str,
        module: Option<ModuleKind>,
        clarification: Option<&str>,
    ) -> AppResult<IntentExtraction>;
}
