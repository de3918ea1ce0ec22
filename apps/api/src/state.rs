use opsgate_application::GovernanceService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Governance orchestrator behind the whole API surface.
    pub governance_service: GovernanceService,
}
