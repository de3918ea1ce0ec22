//! Console notifier for development. Logs notifications to tracing output.

use async_trait::async_trait;
use opsgate_application::{GovernanceNotification, Notifier};
use opsgate_core::AppResult;
use tracing::info;

/// Development notifier that logs notifications instead of delivering them.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Creates a new console notifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, subject: &str, notification: &GovernanceNotification) -> AppResult<()> {
        info!(
            subject = subject,
            plan_id = %notification.plan_id,
            kind = ?notification.kind,
            risk_level = notification.risk_level.as_str(),
            "--- NOTIFICATION (console) ---"
        );

        Ok(())
    }
}
