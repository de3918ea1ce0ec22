use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgate_application::ExecutionStore;
use opsgate_core::{AppError, AppResult, ExecutionId};
use opsgate_domain::{ExecutionRecord, ExecutionStatus};
use tokio::sync::RwLock;

/// In-memory execution store implementation. Records are immutable except
/// for the single rollback transition, which runs as a compare-and-swap.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<String, ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    /// Creates an empty in-memory execution store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn insert_execution(&self, execution: ExecutionRecord) -> AppResult<()> {
        let mut executions = self.executions.write().await;

        if executions.contains_key(execution.execution_id.as_str()) {
            return Err(AppError::Conflict(format!(
                "execution '{}' already exists",
                execution.execution_id
            )));
        }

        executions.insert(execution.execution_id.as_str().to_owned(), execution);
        Ok(())
    }

    async fn find_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> AppResult<Option<ExecutionRecord>> {
        Ok(self
            .executions
            .read()
            .await
            .get(execution_id.as_str())
            .cloned())
    }

    async fn mark_rolled_back(
        &self,
        execution_id: &ExecutionId,
        rolled_back_at: DateTime<Utc>,
    ) -> AppResult<ExecutionRecord> {
        let mut executions = self.executions.write().await;
        let execution = executions.get_mut(execution_id.as_str()).ok_or_else(|| {
            AppError::NotFound(format!("execution '{execution_id}' does not exist"))
        })?;

        if execution.status != ExecutionStatus::Executed {
            return Err(AppError::Conflict(format!(
                "execution '{execution_id}' cannot be rolled back from status '{}'",
                execution.status
            )));
        }

        execution.status = ExecutionStatus::RolledBack;
        execution.rolled_back_at = Some(rolled_back_at);

        Ok(execution.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;
    use opsgate_application::ExecutionStore;
    use opsgate_core::{AppError, ExecutionId, PlanId};
    use opsgate_domain::{EntityKind, ExecutionRecord, ExecutionStatus, IntentType};

    use super::InMemoryExecutionStore;

    fn execution(status: ExecutionStatus) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: ExecutionId::generate(),
            plan_id: PlanId::generate(),
            intent_type: IntentType::Update,
            entity: EntityKind::Course,
            status,
            before_state: Vec::new(),
            after_state: Vec::new(),
            affected_count: 0,
            error: None,
            supports_rollback: true,
            executed_by: "u-1".to_owned(),
            executed_at: Utc::now(),
            rolled_back_at: None,
        }
    }

    #[tokio::test]
    async fn rollback_transition_is_compare_and_swap() {
        let store = InMemoryExecutionStore::new();
        let record = execution(ExecutionStatus::Executed);
        store.insert_execution(record.clone()).await.unwrap();

        let rolled_back = store
            .mark_rolled_back(&record.execution_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(rolled_back.status, ExecutionStatus::RolledBack);
        assert!(rolled_back.rolled_back_at.is_some());

        let again = store.mark_rolled_back(&record.execution_id, Utc::now()).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn failed_executions_cannot_be_rolled_back() {
        let store = InMemoryExecutionStore::new();
        let record = execution(ExecutionStatus::Failed);
        store.insert_execution(record.clone()).await.unwrap();

        let result = store.mark_rolled_back(&record.execution_id, Utc::now()).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
