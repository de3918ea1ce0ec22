#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgate_core::{ActorRole, ActorSnapshot, AppError, AppResult, ExecutionId, PlanId};
use opsgate_domain::{
    AuditEntry, AuditEventType, DecisionKind, DecisionRecord, EntityKind, ExecutionRecord,
    ExecutionStatus, IntentExtraction, ModuleKind, Plan, PlanStatus, RecordFilters,
    RecordSnapshot, RiskLevel,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::GovernanceService;
use crate::governance_policy::{GateMode, GovernancePolicy};
use crate::governance_ports::{
    AuditLog, AuditQuery, DecisionInput, DomainDataGateway, DomainMutation, ExecutionStore,
    GovernanceStats, IntentClassifier, PlanStore, SubmitCommandInput, TwoFactorVerifier,
};

const VALID_CODE: &str = "246810";

struct FakeClassifier {
    responses: Mutex<VecDeque<IntentExtraction>>,
}

impl FakeClassifier {
    fn new(responses: Vec<IntentExtraction>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl IntentClassifier for FakeClassifier {
    async fn classify(
        &self,
        _command: &str,
        _module: Option<ModuleKind>,
        _clarification: Option<&str>,
    ) -> AppResult<IntentExtraction> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| AppError::Internal("no scripted classification left".to_owned()))
    }
}

#[derive(Default)]
struct FakeGateway {
    records: Mutex<BTreeMap<(EntityKind, u64), Value>>,
    next_id: Mutex<u64>,
    fail_mutations: bool,
}

impl FakeGateway {
    fn failing() -> Self {
        Self {
            fail_mutations: true,
            ..Self::default()
        }
    }

    async fn seed(&self, entity: EntityKind, rows: Vec<Value>) {
        let mut records = self.records.lock().await;
        let mut next_id = self.next_id.lock().await;
        for row in rows {
            *next_id += 1;
            records.insert((entity, *next_id), row);
        }
    }

    async fn record(&self, entity: EntityKind, id: u64) -> Option<Value> {
        self.records.lock().await.get(&(entity, id)).cloned()
    }

    fn matches(id: u64, record: &Value, filters: &RecordFilters) -> bool {
        if let Some(filter_id) = &filters.id
            && filter_id.parse::<u64>().ok() != Some(id)
        {
            return false;
        }
        if let Some(semester) = filters.semester
            && record.get("semester").and_then(Value::as_i64) != Some(i64::from(semester))
        {
            return false;
        }
        if let Some(department) = &filters.department {
            let found = record
                .get("department")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !found.to_lowercase().contains(&department.to_lowercase()) {
                return false;
            }
        }
        filters
            .fields
            .iter()
            .all(|(key, value)| record.get(key) == Some(value))
    }

    fn snapshot(entity: EntityKind, id: u64, data: Value) -> RecordSnapshot {
        RecordSnapshot {
            entity,
            record_id: id.to_string(),
            data,
        }
    }
}

#[async_trait]
impl DomainDataGateway for FakeGateway {
    async fn query(
        &self,
        entity: EntityKind,
        filters: &RecordFilters,
        limit: Option<usize>,
    ) -> AppResult<Vec<RecordSnapshot>> {
        let records = self.records.lock().await;
        let mut matched: Vec<RecordSnapshot> = records
            .iter()
            .filter(|((stored_entity, id), record)| {
                *stored_entity == entity && Self::matches(*id, record, filters)
            })
            .map(|((_, id), record)| Self::snapshot(entity, *id, record.clone()))
            .collect();
        if let Some(limit) = limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn count(&self, entity: EntityKind, filters: &RecordFilters) -> AppResult<u64> {
        let matched = self.query(entity, filters, None).await?;
        Ok(u64::try_from(matched.len()).unwrap_or(u64::MAX))
    }

    async fn mutate(
        &self,
        entity: EntityKind,
        mutation: DomainMutation,
    ) -> AppResult<Vec<RecordSnapshot>> {
        if self.fail_mutations {
            return Err(AppError::Internal("simulated storage failure".to_owned()));
        }

        let mut records = self.records.lock().await;
        match mutation {
            DomainMutation::Insert { values } => {
                let mut next_id = self.next_id.lock().await;
                *next_id += 1;
                let record = Value::Object(values.into_iter().collect());
                records.insert((entity, *next_id), record.clone());
                Ok(vec![Self::snapshot(entity, *next_id, record)])
            }
            DomainMutation::Update { filters, values } => {
                let ids: Vec<u64> = records
                    .iter()
                    .filter(|((stored_entity, id), record)| {
                        *stored_entity == entity && Self::matches(*id, record, &filters)
                    })
                    .map(|((_, id), _)| *id)
                    .collect();
                let mut post = Vec::new();
                for id in ids {
                    if let Some(record) = records.get_mut(&(entity, id)) {
                        if let Value::Object(object) = record {
                            for (key, value) in &values {
                                object.insert(key.clone(), value.clone());
                            }
                        }
                        post.push(Self::snapshot(entity, id, record.clone()));
                    }
                }
                Ok(post)
            }
            DomainMutation::Delete { filters } => {
                let ids: Vec<u64> = records
                    .iter()
                    .filter(|((stored_entity, id), record)| {
                        *stored_entity == entity && Self::matches(*id, record, &filters)
                    })
                    .map(|((_, id), _)| *id)
                    .collect();
                let mut removed = Vec::new();
                for id in ids {
                    if let Some(record) = records.remove(&(entity, id)) {
                        removed.push(Self::snapshot(entity, id, record));
                    }
                }
                Ok(removed)
            }
            DomainMutation::Restore { snapshots } => {
                let mut restored = Vec::new();
                for snapshot in snapshots {
                    let id = snapshot.record_id.parse::<u64>().map_err(|_| {
                        AppError::Validation(format!(
                            "record id '{}' is not restorable",
                            snapshot.record_id
                        ))
                    })?;
                    records.insert((entity, id), snapshot.data.clone());
                    restored.push(Self::snapshot(entity, id, snapshot.data));
                }
                Ok(restored)
            }
            DomainMutation::DeleteByKey { record_ids } => {
                let mut removed = Vec::new();
                for record_id in record_ids {
                    let id = record_id.parse::<u64>().map_err(|_| {
                        AppError::Validation(format!("record id '{record_id}' is not removable"))
                    })?;
                    if let Some(record) = records.remove(&(entity, id)) {
                        removed.push(Self::snapshot(entity, id, record));
                    }
                }
                Ok(removed)
            }
        }
    }
}

#[derive(Default)]
struct FakePlanStore {
    plans: Mutex<HashMap<String, Plan>>,
}

#[async_trait]
impl PlanStore for FakePlanStore {
    async fn insert_plan(&self, plan: Plan) -> AppResult<()> {
        let mut plans = self.plans.lock().await;
        if plans.contains_key(plan.plan_id.as_str()) {
            return Err(AppError::Conflict(format!(
                "plan '{}' already exists",
                plan.plan_id
            )));
        }
        plans.insert(plan.plan_id.as_str().to_owned(), plan);
        Ok(())
    }

    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<Plan>> {
        Ok(self.plans.lock().await.get(plan_id.as_str()).cloned())
    }

    async fn transition_status(
        &self,
        plan_id: &PlanId,
        expected: &[PlanStatus],
        next: PlanStatus,
        decision: Option<DecisionRecord>,
    ) -> AppResult<Plan> {
        let mut plans = self.plans.lock().await;
        let plan = plans
            .get_mut(plan_id.as_str())
            .ok_or_else(|| AppError::NotFound(format!("plan '{plan_id}' does not exist")))?;

        if !expected.contains(&plan.status) || !plan.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "plan '{plan_id}' is not awaiting this transition (status '{}')",
                plan.status
            )));
        }

        plan.status = next;
        if decision.is_some() {
            plan.decision = decision;
        }
        plan.updated_at = Utc::now();

        Ok(plan.clone())
    }

    async fn list_awaiting_decision(&self) -> AppResult<Vec<Plan>> {
        let plans = self.plans.lock().await;
        let mut awaiting: Vec<Plan> = plans
            .values()
            .filter(|plan| plan.status.is_awaiting_decision())
            .cloned()
            .collect();
        awaiting.sort_by_key(|plan| plan.created_at);
        Ok(awaiting)
    }
}

#[derive(Default)]
struct FakeExecutionStore {
    executions: Mutex<HashMap<String, ExecutionRecord>>,
}

#[async_trait]
impl ExecutionStore for FakeExecutionStore {
    async fn insert_execution(&self, execution: ExecutionRecord) -> AppResult<()> {
        self.executions
            .lock()
            .await
            .insert(execution.execution_id.as_str().to_owned(), execution);
        Ok(())
    }

    async fn find_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> AppResult<Option<ExecutionRecord>> {
        Ok(self
            .executions
            .lock()
            .await
            .get(execution_id.as_str())
            .cloned())
    }

    async fn mark_rolled_back(
        &self,
        execution_id: &ExecutionId,
        rolled_back_at: DateTime<Utc>,
    ) -> AppResult<ExecutionRecord> {
        let mut executions = self.executions.lock().await;
        let execution = executions.get_mut(execution_id.as_str()).ok_or_else(|| {
            AppError::NotFound(format!("execution '{execution_id}' does not exist"))
        })?;

        if execution.status != ExecutionStatus::Executed {
            return Err(AppError::Conflict(format!(
                "execution '{execution_id}' is not in 'executed' (status '{}')",
                execution.status
            )));
        }

        execution.status = ExecutionStatus::RolledBack;
        execution.rolled_back_at = Some(rolled_back_at);

        Ok(execution.clone())
    }
}

#[derive(Default)]
struct FakeAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl FakeAuditLog {
    async fn events_for(&self, plan_id: &PlanId) -> Vec<AuditEventType> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|entry| &entry.plan_id == plan_id)
            .map(|entry| entry.event_type)
            .collect()
    }
}

#[async_trait]
impl AuditLog for FakeAuditLog {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn query(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        let entries = self.entries.lock().await;
        let mut matched: Vec<AuditEntry> = entries
            .iter()
            .filter(|entry| {
                query.module.is_none_or(|module| entry.module == module)
                    && query
                        .operation_type
                        .is_none_or(|operation| entry.operation_type == operation)
                    && query.risk_level.is_none_or(|risk| entry.risk_level == risk)
                    && query
                        .actor_subject
                        .as_deref()
                        .is_none_or(|subject| entry.actor_subject == subject)
            })
            .cloned()
            .collect();
        matched.reverse();
        matched.truncate(query.limit);
        Ok(matched)
    }

    async fn stats(&self) -> AppResult<GovernanceStats> {
        let entries = self.entries.lock().await;
        let mut stats = GovernanceStats::default();
        for entry in entries.iter() {
            match entry.event_type {
                AuditEventType::Created => {
                    stats.total_plans += 1;
                    match entry.risk_level {
                        RiskLevel::Low => stats.low_risk_plans += 1,
                        RiskLevel::Medium => stats.medium_risk_plans += 1,
                        RiskLevel::High => stats.high_risk_plans += 1,
                    }
                    *stats
                        .plans_by_module
                        .entry(entry.module.as_str().to_owned())
                        .or_default() += 1;
                }
                AuditEventType::Executed => stats.executed_total += 1,
                AuditEventType::Failed => stats.failed_total += 1,
                AuditEventType::Rollback => stats.rolled_back_total += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}

struct FakeTwoFactor;

#[async_trait]
impl TwoFactorVerifier for FakeTwoFactor {
    async fn verify(&self, _subject: &str, code: &str) -> AppResult<bool> {
        Ok(code == VALID_CODE)
    }
}

struct Harness {
    service: GovernanceService,
    gateway: Arc<FakeGateway>,
    execution_store: Arc<FakeExecutionStore>,
    audit_log: Arc<FakeAuditLog>,
}

fn harness_with(
    responses: Vec<IntentExtraction>,
    gateway: Arc<FakeGateway>,
    policy: GovernancePolicy,
) -> Harness {
    let execution_store = Arc::new(FakeExecutionStore::default());
    let audit_log = Arc::new(FakeAuditLog::default());

    let service = GovernanceService::new(
        Arc::new(FakeClassifier::new(responses)),
        gateway.clone(),
        Arc::new(FakePlanStore::default()),
        execution_store.clone(),
        audit_log.clone(),
        Arc::new(FakeTwoFactor),
        policy,
    );

    Harness {
        service,
        gateway,
        execution_store,
        audit_log,
    }
}

fn harness(responses: Vec<IntentExtraction>) -> Harness {
    harness_with(
        responses,
        Arc::new(FakeGateway::default()),
        GovernancePolicy::default(),
    )
}

fn admin() -> ActorSnapshot {
    ActorSnapshot::new("admin-1", "Rhea Operator", ActorRole::Admin, None)
}

fn faculty(department: &str) -> ActorSnapshot {
    ActorSnapshot::new(
        "fac-7",
        "Noor Lecturer",
        ActorRole::Faculty,
        Some(department.to_owned()),
    )
}

fn extraction(intent: &str, entity: &str, confidence: f64) -> IntentExtraction {
    IntentExtraction {
        intent: intent.to_owned(),
        entity: entity.to_owned(),
        confidence,
        ..IntentExtraction::default()
    }
}

fn submit(command: &str) -> SubmitCommandInput {
    SubmitCommandInput {
        command: command.to_owned(),
        module: None,
        clarification: None,
    }
}

fn decision(plan_id: &PlanId, decision: DecisionKind) -> DecisionInput {
    DecisionInput {
        plan_id: plan_id.clone(),
        decision,
        comment: None,
        two_factor_code: None,
        actor_token: None,
    }
}

fn student_row(name: &str, department: &str, semester: i64, cgpa: f64) -> Value {
    json!({
        "name": name,
        "department": department,
        "semester": semester,
        "cgpa": cgpa,
    })
}

#[tokio::test]
async fn faculty_delete_of_student_record_is_denied_without_execution() {
    let mut classified = extraction("DELETE", "student", 0.95);
    classified.filters.id = Some("5".to_owned());
    let harness = harness(vec![classified]);

    let submitted = harness
        .service
        .submit_command(&faculty("Computer Science"), submit("delete student record #5"))
        .await
        .unwrap();

    assert_eq!(submitted.plan.status, PlanStatus::PermissionDenied);
    assert_eq!(
        submitted.plan.permission_reason.as_str(),
        "STUDENT_WRITE_RESTRICTED"
    );
    assert!(submitted.plan.escalation_required);
    assert!(submitted.auto_execution.is_none());
    assert!(harness.execution_store.executions.lock().await.is_empty());
    assert_eq!(
        harness.audit_log.events_for(&submitted.plan.plan_id).await,
        vec![AuditEventType::PermissionDenied]
    );
}

#[tokio::test]
async fn confirmed_bulk_cgpa_update_executes_and_rolls_back_exactly() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(
            EntityKind::Student,
            vec![
                student_row("Asha", "Computer Science", 5, 7.1),
                student_row("Birk", "Computer Science", 5, 6.4),
                student_row("Cai", "Computer Science", 5, 8.8),
            ],
        )
        .await;

    let mut classified = extraction("UPDATE", "student", 0.92);
    classified.filters.semester = Some(5);
    classified.values = BTreeMap::from([("cgpa".to_owned(), json!(9.1))]);
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let actor = admin();
    let submitted = harness
        .service
        .submit_command(&actor, submit("update CGPA for semester 5 students"))
        .await
        .unwrap();

    assert_eq!(submitted.plan.risk_level, RiskLevel::Medium);
    assert_eq!(submitted.plan.status, PlanStatus::AwaitingConfirmation);
    assert_eq!(submitted.plan.estimated_impact_count, 3);
    assert!(submitted.plan.gates.requires_confirmation);
    assert!(!submitted.plan.gates.requires_senior_approval);
    assert_eq!(submitted.plan.preview.affected_records.len(), 3);
    assert_eq!(submitted.plan.preview.proposed_changes.len(), 3);

    let outcome = harness
        .service
        .decide(&actor, decision(&submitted.plan.plan_id, DecisionKind::Approve))
        .await
        .unwrap();
    let execution = outcome.execution.unwrap();

    assert_eq!(outcome.plan.status, PlanStatus::Executed);
    assert_eq!(execution.before_state.len(), 3);
    assert_eq!(execution.after_state.len(), 3);
    assert!(execution.snapshots_aligned());
    assert_eq!(
        harness
            .gateway
            .record(EntityKind::Student, 1)
            .await
            .unwrap()["cgpa"],
        json!(9.1)
    );

    let rolled_back = harness
        .service
        .rollback_execution(&actor, &execution.execution_id)
        .await
        .unwrap();
    assert_eq!(rolled_back.execution.status, ExecutionStatus::RolledBack);
    assert_eq!(rolled_back.plan.status, PlanStatus::RolledBack);
    assert_eq!(
        harness
            .gateway
            .record(EntityKind::Student, 1)
            .await
            .unwrap()["cgpa"],
        json!(7.1)
    );
    assert_eq!(
        harness
            .gateway
            .record(EntityKind::Student, 2)
            .await
            .unwrap()["cgpa"],
        json!(6.4)
    );

    // Idempotent: a second rollback is a no-op success.
    let again = harness
        .service
        .rollback_execution(&actor, &execution.execution_id)
        .await
        .unwrap();
    assert_eq!(again.execution.status, ExecutionStatus::RolledBack);
    assert_eq!(
        harness
            .gateway
            .record(EntityKind::Student, 1)
            .await
            .unwrap()["cgpa"],
        json!(7.1)
    );

    let events = harness.audit_log.events_for(&submitted.plan.plan_id).await;
    assert_eq!(
        events,
        vec![
            AuditEventType::Created,
            AuditEventType::Approved,
            AuditEventType::Executed,
            AuditEventType::Rollback,
        ]
    );
}

#[tokio::test]
async fn read_commands_auto_execute_without_snapshots_or_gates() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(
            EntityKind::Student,
            vec![
                student_row("Asha", "Computer Science", 5, 7.1),
                student_row("Birk", "Computer Science", 3, 6.4),
            ],
        )
        .await;

    let mut classified = extraction("READ", "students", 0.9);
    classified.filters.department = Some("Computer Science".to_owned());
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let actor = admin();
    let submitted = harness
        .service
        .submit_command(&actor, submit("show all students in Computer Science"))
        .await
        .unwrap();

    assert_eq!(submitted.plan.risk_level, RiskLevel::Low);
    assert_eq!(submitted.plan.status, PlanStatus::AutoExecuted);
    assert!(!submitted.plan.gates.requires_confirmation);
    assert!(!submitted.plan.gates.requires_senior_approval);
    assert!(!submitted.plan.gates.requires_2fa);
    assert!(submitted.plan.decision.is_none());

    let execution = submitted.auto_execution.unwrap();
    assert!(execution.before_state.is_empty());
    assert!(execution.after_state.is_empty());
    assert_eq!(execution.affected_count, 2);

    let error = harness
        .service
        .rollback_execution(&actor, &execution.execution_id)
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::RollbackUnsupported(_)));
}

#[tokio::test]
async fn ambiguous_command_pauses_then_resubmission_classifies_fully() {
    let first = IntentExtraction {
        missing_fields: vec!["time_range".to_owned()],
        clarification_question: Some("Which time range should the trend cover?".to_owned()),
        ..extraction("ANALYZE", "attendance", 0.55)
    };
    let second = extraction("ANALYZE", "attendance", 0.9);
    let harness = harness(vec![first, second]);

    let actor = admin();
    let submitted = harness
        .service
        .submit_command(&actor, submit("attendance trends"))
        .await
        .unwrap();

    assert_eq!(submitted.plan.status, PlanStatus::ClarificationRequired);
    let clarification = submitted.clarification.unwrap();
    assert!(clarification
        .missing_fields
        .contains(&"time_range".to_owned()));
    assert!(submitted.auto_execution.is_none());
    assert_eq!(
        harness.audit_log.events_for(&submitted.plan.plan_id).await,
        vec![AuditEventType::ClarificationNeeded]
    );

    let resubmitted = harness
        .service
        .submit_command(
            &actor,
            SubmitCommandInput {
                command: "attendance trends".to_owned(),
                module: None,
                clarification: Some("for the last semester".to_owned()),
            },
        )
        .await
        .unwrap();

    assert_ne!(resubmitted.plan.plan_id, submitted.plan.plan_id);
    assert_eq!(resubmitted.plan.status, PlanStatus::AutoExecuted);
    assert!(resubmitted.clarification.is_none());
}

#[tokio::test]
async fn high_risk_delete_requires_senior_reviewer_and_second_factor() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(
            EntityKind::Course,
            vec![
                json!({"code": "CS101", "semester": 1}),
                json!({"code": "CS102", "semester": 1}),
                json!({"code": "CS103", "semester": 1}),
            ],
        )
        .await;

    let mut classified = extraction("DELETE", "courses", 0.93);
    classified.filters.semester = Some(1);
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let actor = admin();
    let submitted = harness
        .service
        .submit_command(&actor, submit("delete all semester 1 courses"))
        .await
        .unwrap();

    assert_eq!(submitted.plan.risk_level, RiskLevel::High);
    assert_eq!(submitted.plan.status, PlanStatus::AwaitingSeniorApproval);
    assert!(submitted.plan.gates.requires_senior_approval);
    assert!(submitted.plan.gates.requires_2fa);

    // A non-senior reviewer cannot decide a HIGH plan.
    let error = harness
        .service
        .decide(
            &faculty("Computer Science"),
            DecisionInput {
                two_factor_code: Some(VALID_CODE.to_owned()),
                ..decision(&submitted.plan.plan_id, DecisionKind::Approve)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::Forbidden(_)));

    // A senior reviewer without a second factor is refused.
    let error = harness
        .service
        .decide(&actor, decision(&submitted.plan.plan_id, DecisionKind::Approve))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::Unauthorized(_)));

    // A wrong code is refused.
    let error = harness
        .service
        .decide(
            &actor,
            DecisionInput {
                two_factor_code: Some("000000".to_owned()),
                ..decision(&submitted.plan.plan_id, DecisionKind::Approve)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::Unauthorized(_)));

    let outcome = harness
        .service
        .decide(
            &actor,
            DecisionInput {
                two_factor_code: Some(VALID_CODE.to_owned()),
                ..decision(&submitted.plan.plan_id, DecisionKind::Approve)
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.plan.status, PlanStatus::Executed);
    let execution = outcome.execution.unwrap();
    assert_eq!(execution.before_state.len(), 3);
    assert!(execution.after_state.iter().all(RecordSnapshot::is_tombstone));
    assert!(outcome.plan.decision.unwrap().two_factor_verified);
}

#[tokio::test]
async fn escalation_is_terminal_and_reserved_for_senior_gated_plans() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(
            EntityKind::SalaryRecord,
            vec![json!({"employee_id": 4, "net_salary": 52_000})],
        )
        .await;

    let mut classified = extraction("UPDATE", "salary_record", 0.9);
    classified.filters.id = Some("1".to_owned());
    classified.values = BTreeMap::from([("net_salary".to_owned(), json!(61_000))]);
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let actor = admin();
    let submitted = harness
        .service
        .submit_command(&actor, submit("set net salary for employee 4 to 61000"))
        .await
        .unwrap();

    assert_eq!(submitted.plan.risk_level, RiskLevel::High);

    let outcome = harness
        .service
        .decide(
            &actor,
            DecisionInput {
                two_factor_code: Some(VALID_CODE.to_owned()),
                comment: Some("needs board sign-off".to_owned()),
                ..decision(&submitted.plan.plan_id, DecisionKind::Escalate)
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.plan.status, PlanStatus::Escalated);
    assert!(outcome.execution.is_none());
    assert_eq!(
        harness.audit_log.events_for(&submitted.plan.plan_id).await,
        vec![AuditEventType::Created, AuditEventType::Escalated]
    );
}

#[tokio::test]
async fn racing_decisions_resolve_to_exactly_one_winner() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(
            EntityKind::Course,
            vec![json!({"code": "CS101", "credits": 4})],
        )
        .await;

    let mut classified = extraction("UPDATE", "course", 0.9);
    classified.filters.id = Some("1".to_owned());
    classified.values = BTreeMap::from([("credits".to_owned(), json!(5))]);
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let actor = admin();
    let submitted = harness
        .service
        .submit_command(&actor, submit("change CS101 to 5 credits"))
        .await
        .unwrap();
    assert_eq!(submitted.plan.status, PlanStatus::AwaitingConfirmation);

    let approve = harness
        .service
        .decide(&actor, decision(&submitted.plan.plan_id, DecisionKind::Approve));
    let reject = harness
        .service
        .decide(&actor, decision(&submitted.plan.plan_id, DecisionKind::Reject));

    let (approve_result, reject_result) = tokio::join!(approve, reject);
    let winners = [approve_result.is_ok(), reject_result.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(winners, 1);

    let loser = if approve_result.is_ok() {
        reject_result.unwrap_err()
    } else {
        approve_result.unwrap_err()
    };
    assert!(matches!(loser, AppError::Conflict(_)));
}

#[tokio::test]
async fn role_change_between_creation_and_decision_is_stale() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(EntityKind::Attendance, vec![json!({"is_present": false})])
        .await;

    let mut classified = extraction("UPDATE", "attendance", 0.9);
    classified.filters.id = Some("1".to_owned());
    classified.values = BTreeMap::from([("is_present".to_owned(), json!(true))]);
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let creator = ActorSnapshot::new(
        "adm-2",
        "Siv Registrar",
        ActorRole::Admin,
        Some("Computer Science".to_owned()),
    );
    let submitted = harness
        .service
        .submit_command(&creator, submit("mark attendance record 1 present"))
        .await
        .unwrap();
    assert_eq!(submitted.plan.status, PlanStatus::AwaitingConfirmation);

    // Same subject, different department scope: the freshness token no
    // longer matches the creation-time snapshot.
    let drifted = ActorSnapshot::new(
        "adm-2",
        "Siv Registrar",
        ActorRole::Admin,
        Some("Mathematics".to_owned()),
    );
    let error = harness
        .service
        .decide(&drifted, decision(&submitted.plan.plan_id, DecisionKind::Approve))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::StaleActor(_)));

    let plan = harness.service.plan(&submitted.plan.plan_id).await.unwrap();
    assert_eq!(plan.status, PlanStatus::AwaitingConfirmation);
    assert!(harness.execution_store.executions.lock().await.is_empty());
}

#[tokio::test]
async fn zero_impact_update_is_coerced_low_and_still_audited() {
    let mut classified = extraction("UPDATE", "course", 0.9);
    classified.filters.semester = Some(9);
    classified.values = BTreeMap::from([("credits".to_owned(), json!(2))]);
    let harness = harness(vec![classified]);

    let submitted = harness
        .service
        .submit_command(&admin(), submit("set semester 9 courses to 2 credits"))
        .await
        .unwrap();

    assert_eq!(submitted.plan.risk_level, RiskLevel::Low);
    assert_eq!(submitted.plan.estimated_impact_count, 0);
    assert_eq!(submitted.plan.status, PlanStatus::AutoExecuted);
    assert_eq!(
        harness.audit_log.events_for(&submitted.plan.plan_id).await,
        vec![AuditEventType::Created, AuditEventType::Executed]
    );
}

#[tokio::test]
async fn failed_mutation_records_failed_execution_before_surfacing() {
    let gateway = Arc::new(FakeGateway::failing());
    gateway
        .seed(
            EntityKind::Course,
            vec![json!({"code": "CS101", "credits": 4})],
        )
        .await;

    let mut classified = extraction("UPDATE", "course", 0.9);
    classified.filters.id = Some("1".to_owned());
    classified.values = BTreeMap::from([("credits".to_owned(), json!(5))]);
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let actor = admin();
    let submitted = harness
        .service
        .submit_command(&actor, submit("change CS101 to 5 credits"))
        .await
        .unwrap();

    let error = harness
        .service
        .decide(&actor, decision(&submitted.plan.plan_id, DecisionKind::Approve))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::ExecutionFailed(_)));

    let plan = harness.service.plan(&submitted.plan.plan_id).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Failed);

    let executions = harness.execution_store.executions.lock().await;
    let execution = executions.values().next().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.snapshots_aligned());
    assert_eq!(execution.before_state.len(), 1);
    drop(executions);

    let events = harness.audit_log.events_for(&submitted.plan.plan_id).await;
    assert_eq!(
        events,
        vec![
            AuditEventType::Created,
            AuditEventType::Approved,
            AuditEventType::Failed,
        ]
    );
}

#[tokio::test]
async fn audit_only_mode_executes_everything_immediately() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(
            EntityKind::Invoice,
            vec![
                json!({"invoice_number": "INV-1", "status": "open"}),
                json!({"invoice_number": "INV-2", "status": "open"}),
            ],
        )
        .await;

    let mut classified = extraction("DELETE", "invoices", 0.9);
    classified.filters.fields =
        BTreeMap::from([("status".to_owned(), json!("open"))]);
    let policy = GovernancePolicy {
        gate_mode: GateMode::AuditOnly,
        ..GovernancePolicy::default()
    };
    let harness = harness_with(vec![classified], gateway, policy);

    let submitted = harness
        .service
        .submit_command(&admin(), submit("delete open invoices"))
        .await
        .unwrap();

    // The true risk tier stays on the plan for the audit trail; only the
    // routing is degenerate.
    assert_eq!(submitted.plan.risk_level, RiskLevel::High);
    assert_eq!(submitted.plan.status, PlanStatus::AutoExecuted);
    assert!(submitted.auto_execution.is_some());
}

#[tokio::test]
async fn non_senior_audit_queries_are_scoped_to_their_own_entries() {
    let mut classified = extraction("READ", "course", 0.9);
    classified.filters.semester = Some(1);
    let harness = harness(vec![classified, extraction("READ", "course", 0.9)]);

    let lecturer = faculty("Computer Science");
    harness
        .service
        .submit_command(&lecturer, submit("show semester 1 courses"))
        .await
        .unwrap();
    harness
        .service
        .submit_command(&admin(), submit("show all courses"))
        .await
        .unwrap();

    let own = harness
        .service
        .audit_history(&lecturer, AuditQuery::default())
        .await
        .unwrap();
    assert!(!own.is_empty());
    assert!(own.iter().all(|entry| entry.actor_subject == "fac-7"));

    let all = harness
        .service
        .audit_history(&admin(), AuditQuery::default())
        .await
        .unwrap();
    assert!(all.len() > own.len());

    let error = harness.service.stats(&lecturer).await.unwrap_err();
    assert!(matches!(error, AppError::Forbidden(_)));

    let stats = harness.service.stats(&admin()).await.unwrap();
    assert_eq!(stats.total_plans, 2);
    assert_eq!(stats.executed_total, 2);
}

#[tokio::test]
async fn pending_queue_is_visible_to_senior_roles_only() {
    let gateway = Arc::new(FakeGateway::default());
    gateway
        .seed(
            EntityKind::Course,
            vec![json!({"code": "CS101", "credits": 4})],
        )
        .await;

    let mut classified = extraction("UPDATE", "course", 0.9);
    classified.filters.id = Some("1".to_owned());
    classified.values = BTreeMap::from([("credits".to_owned(), json!(3))]);
    let harness = harness_with(vec![classified], gateway, GovernancePolicy::default());

    let submitted = harness
        .service
        .submit_command(&admin(), submit("change CS101 to 3 credits"))
        .await
        .unwrap();
    assert!(submitted.plan.status.is_awaiting_decision());

    let queue = harness.service.pending_approvals(&admin()).await.unwrap();
    assert_eq!(queue.len(), 1);

    let hidden = harness
        .service
        .pending_approvals(&faculty("Computer Science"))
        .await
        .unwrap();
    assert!(hidden.is_empty());
}

#[tokio::test]
async fn decision_kind_parses_case_insensitively() {
    assert_eq!(
        DecisionKind::from_str("approve").ok(),
        Some(DecisionKind::Approve)
    );
    assert_eq!(
        DecisionKind::from_str("REJECT").ok(),
        Some(DecisionKind::Reject)
    );
    assert!(DecisionKind::from_str("defer").is_err());
}
