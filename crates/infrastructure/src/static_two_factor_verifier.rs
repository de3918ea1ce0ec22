//! Static-code verifier for development. Accepts one configured code.

use async_trait::async_trait;
use opsgate_application::TwoFactorVerifier;
use opsgate_core::AppResult;

/// Development second-factor verifier that accepts a single configured code.
/// Never use outside local development.
#[derive(Debug, Clone)]
pub struct StaticTwoFactorVerifier {
    code: String,
}

impl StaticTwoFactorVerifier {
    /// Creates a verifier accepting the given code for every subject.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl TwoFactorVerifier for StaticTwoFactorVerifier {
    async fn verify(&self, _subject: &str, code: &str) -> AppResult<bool> {
        Ok(code == self.code)
    }
}
