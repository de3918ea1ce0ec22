//! Second-factor verifier implementation using the `totp-rs` crate.

use std::collections::HashMap;

use async_trait::async_trait;
use opsgate_application::TwoFactorVerifier;
use opsgate_core::{AppError, AppResult};
use tokio::sync::RwLock;
use totp_rs::{Algorithm, Secret, TOTP};

/// TOTP verifier with RFC 6238 compliance: 6-digit codes, 30-second window,
/// +/-1 step tolerance.
pub struct TotpTwoFactorVerifier {
    issuer: String,
    secrets: RwLock<HashMap<String, Vec<u8>>>,
}

impl TotpTwoFactorVerifier {
    /// Creates a verifier with no enrolled subjects.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            secrets: RwLock::new(HashMap::new()),
        }
    }

    /// Enrolls a subject with raw secret bytes.
    pub async fn register_secret(&self, subject: impl Into<String>, secret: Vec<u8>) {
        self.secrets.write().await.insert(subject.into(), secret);
    }

    /// Enrolls a subject with a base32-encoded secret.
    pub async fn register_base32(
        &self,
        subject: impl Into<String>,
        encoded: impl Into<String>,
    ) -> AppResult<()> {
        let secret = Secret::Encoded(encoded.into()).to_bytes().map_err(|error| {
            AppError::Validation(format!("invalid base32 TOTP secret: {error}"))
        })?;
        self.register_secret(subject, secret).await;

        Ok(())
    }
}

#[async_trait]
impl TwoFactorVerifier for TotpTwoFactorVerifier {
    async fn verify(&self, subject: &str, code: &str) -> AppResult<bool> {
        let secret = {
            let secrets = self.secrets.read().await;
            secrets.get(subject).cloned()
        };
        let Some(secret) = secret else {
            // An unenrolled subject can never present a valid factor.
            return Ok(false);
        };

        let totp = TOTP::new(
            Algorithm::SHA1,
            6,
            1, // skew: allows +/-1 time step
            30,
            secret,
            Some(self.issuer.clone()),
            subject.to_owned(),
        )
        .map_err(|error| AppError::Internal(format!("failed to create TOTP instance: {error}")))?;

        totp.check_current(code)
            .map_err(|error| AppError::Internal(format!("failed to verify TOTP code: {error}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use opsgate_application::TwoFactorVerifier;
    use totp_rs::Secret;

    use super::TotpTwoFactorVerifier;

    #[tokio::test]
    async fn unenrolled_subject_is_rejected() {
        let verifier = TotpTwoFactorVerifier::new("Opsgate");
        assert!(!verifier.verify("ghost", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn enrolled_subject_verifies_a_current_code() {
        let verifier = TotpTwoFactorVerifier::new("Opsgate");
        let secret = Secret::generate_secret();
        let secret_bytes = secret.to_bytes().unwrap();
        verifier
            .register_secret("admin-1", secret_bytes.clone())
            .await;

        let totp = totp_rs::TOTP::new(
            totp_rs::Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some("Opsgate".to_owned()),
            "admin-1".to_owned(),
        )
        .unwrap();
        let code = totp.generate_current().unwrap();

        assert!(verifier.verify("admin-1", &code).await.unwrap());
        assert!(!verifier.verify("admin-1", "000000").await.unwrap());
    }
}
