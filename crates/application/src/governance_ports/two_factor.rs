use async_trait::async_trait;
use opsgate_core::AppResult;

/// Second-factor verification for HIGH-risk decisions. Infrastructure
/// provides the actual TOTP implementation.
#[async_trait]
pub trait TwoFactorVerifier: Send + Sync {
    /// Verifies a one-time code for the given subject.
    async fn verify(&self, subject: &str, code: &str) -> AppResult<bool>;
}
