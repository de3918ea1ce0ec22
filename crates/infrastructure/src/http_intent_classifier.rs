use async_trait::async_trait;
use opsgate_application::IntentClassifier;
use opsgate_core::{AppError, AppResult};
use opsgate_domain::{IntentExtraction, ModuleKind};
use serde::Serialize;
use url::Url;

/// HTTP adapter for a remotely hosted intent classifier.
///
/// The language-model service itself lives outside this system; this adapter
/// only ships the command over and deserializes the structured extraction it
/// returns.
pub struct HttpIntentClassifier {
    http_client: reqwest::Client,
    endpoint: Url,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    command: &'a str,
    module: Option<&'a str>,
    clarification: Option<&'a str>,
}

impl HttpIntentClassifier {
    /// Creates a classifier adapter for the given endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

#[async_trait]
impl IntentClassifier for HttpIntentClassifier {
    async fn classify(
        &self,
        command: &str,
        module: Option<ModuleKind>,
        clarification: Option<&str>,
    ) -> AppResult<IntentExtraction> {
        let request = ClassifyRequest {
            command,
            module: module.map(|module| module.as_str()),
            clarification,
        };

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("intent classifier transport error: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "intent classifier returned status {}",
                response.status()
            )));
        }

        response.json::<IntentExtraction>().await.map_err(|error| {
            AppError::Internal(format!(
                "intent classifier returned an unreadable payload: {error}"
            ))
        })
    }
}
