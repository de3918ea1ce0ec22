//! Infrastructure adapters for Opsgate: Postgres and in-memory
//! implementations of the application ports, intent classifier adapters, the
//! TOTP second-factor verifier and the console notifier.

#![forbid(unsafe_code)]

mod console_notifier;
mod http_intent_classifier;
mod in_memory_audit_log;
mod in_memory_domain_gateway;
mod in_memory_execution_store;
mod in_memory_plan_store;
mod keyword_intent_classifier;
mod postgres_audit_log;
mod postgres_execution_store;
mod postgres_plan_store;
mod static_two_factor_verifier;
mod totp_two_factor_verifier;

pub use console_notifier::ConsoleNotifier;
pub use http_intent_classifier::HttpIntentClassifier;
pub use in_memory_audit_log::InMemoryAuditLog;
pub use in_memory_domain_gateway::InMemoryDomainGateway;
pub use in_memory_execution_store::InMemoryExecutionStore;
pub use in_memory_plan_store::InMemoryPlanStore;
pub use keyword_intent_classifier::KeywordIntentClassifier;
pub use postgres_audit_log::PostgresAuditLog;
pub use postgres_execution_store::PostgresExecutionStore;
pub use postgres_plan_store::PostgresPlanStore;
pub use static_two_factor_verifier::StaticTwoFactorVerifier;
pub use totp_two_factor_verifier::TotpTwoFactorVerifier;
