use std::sync::Mutex;

use orc_audit::AuditLog;
use serde_json::Value;
use tracing::{error, warn};
use uuid::Uuid;

use crate::action::PendingAction;
use crate::types::{ActionRecord, ActionStatus, Saga, SagaOutcome};

/// Sequences a saga's actions in order, and on first failure rolls back
/// every action that had already succeeded, newest first (§4.J).
///
/// Parallel sagas for the same user are allowed — each `CompensationOrchestrator`
/// call operates on exactly one saga, so concurrent callers never share
/// a compensation list.
pub struct CompensationOrchestrator {
    audit: AuditLog,
    sagas: Mutex<Vec<(Saga, Vec<PendingAction>)>>,
}

impl CompensationOrchestrator {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit, sagas: Mutex::new(Vec::new()) }
    }

    pub fn create_saga(&self, user_id: &str, saga_name: &str) -> String {
        let saga_id = Uuid::new_v4().to_string();
        let saga = Saga::new(saga_id.clone(), user_id, saga_name);
        self.sagas.lock().unwrap().push((saga, Vec::new()));
        saga_id
    }

    pub fn add_action(&self, saga_id: &str, action: PendingAction) {
        let mut sagas = self.sagas.lock().unwrap();
        if let Some((saga, actions)) = sagas.iter_mut().find(|(s, _)| s.saga_id == saga_id) {
            saga.actions.push(ActionRecord {
                action_type: action.action_type.clone(),
                name: action.name.clone(),
                input_params: action.input_params.clone(),
                status: ActionStatus::Pending,
                result: None,
                error: None,
            });
            actions.push(action);
        }
    }

    pub async fn execute_saga(&self, saga_id: &str) -> SagaOutcome {
        let (user_id, saga_name, actions) = {
            let mut sagas = self.sagas.lock().unwrap();
            let Some(idx) = sagas.iter().position(|(s, _)| s.saga_id == saga_id) else {
                return SagaOutcome {
                    success: false,
                    error: Some(format!("unknown saga: {saga_id}")),
                    steps: Vec::new(),
                };
            };
            let (saga, actions) = sagas.remove(idx);
            (saga.user_id, saga.saga_name, actions)
        };

        let mut steps: Vec<ActionRecord> = Vec::with_capacity(actions.len());
        let mut succeeded: Vec<(usize, Value)> = Vec::new();
        let mut failure: Option<String> = None;

        for (idx, action) in actions.iter().enumerate() {
            let audit_id = self.audit.log(
                &user_id,
                &action.action_type,
                &action.name,
                &action.input_params,
                true,
                Some(&format!("compensate:{}", action.name)),
            );

            match action.executor.execute(&action.input_params).await {
                Ok(result) => {
                    self.audit.mark_success(&audit_id, &result);
                    steps.push(ActionRecord {
                        action_type: action.action_type.clone(),
                        name: action.name.clone(),
                        input_params: action.input_params.clone(),
                        status: ActionStatus::Success,
                        result: Some(result.clone()),
                        error: None,
                    });
                    succeeded.push((idx, result));
                }
                Err(err) => {
                    self.audit.mark_failed(&audit_id, &err);
                    warn!(saga_id, saga_name = %saga_name, action = %action.name, error = %err, "saga action failed, starting compensation");
                    steps.push(ActionRecord {
                        action_type: action.action_type.clone(),
                        name: action.name.clone(),
                        input_params: action.input_params.clone(),
                        status: ActionStatus::Failed,
                        result: None,
                        error: Some(err.clone()),
                    });
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            for (idx, result) in succeeded.into_iter().rev() {
                let action = &actions[idx];
                let audit_id = self.audit.log(
                    &user_id,
                    &action.action_type,
                    &format!("compensate:{}", action.name),
                    &action.input_params,
                    false,
                    None,
                );
                match action.compensator.compensate(&action.input_params, &result).await {
                    Ok(()) => {
                        self.audit.mark_success(&audit_id, &Value::Null);
                        steps[idx].status = ActionStatus::Compensated;
                    }
                    Err(comp_err) => {
                        self.audit.mark_failed(&audit_id, &comp_err);
                        error!(saga_id, action = %action.name, error = %comp_err, "compensator failed, halting further rollback");
                        break;
                    }
                }
            }
            return SagaOutcome { success: false, error: Some(err), steps };
        }

        SagaOutcome { success: true, error: None, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn orchestrator() -> CompensationOrchestrator {
        let conn = Connection::open_in_memory().unwrap();
        orc_audit::init_db(&conn).unwrap();
        CompensationOrchestrator::new(AuditLog::new(conn))
    }

    struct AlwaysSucceeds {
        tag: &'static str,
    }

    #[async_trait]
    impl crate::action::Executor for AlwaysSucceeds {
        async fn execute(&self, _input_params: &Value) -> Result<Value, String> {
            Ok(Value::String(self.tag.to_string()))
        }
    }

    struct NoopCompensator {
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl crate::action::Compensator for NoopCompensator {
        async fn compensate(&self, _input_params: &Value, _execute_result: &Value) -> Result<(), String> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl crate::action::Executor for AlwaysFails {
        async fn execute(&self, _input_params: &Value) -> Result<Value, String> {
            Err("backend unreachable".to_string())
        }
    }

    #[tokio::test]
    async fn all_actions_succeed_runs_no_compensation() {
        let orch = orchestrator();
        let saga_id = orch.create_saga("u1", "schedule_booking");
        let ran = Arc::new(AtomicBool::new(false));
        orch.add_action(
            &saga_id,
            PendingAction {
                action_type: "tool".into(),
                name: "create_booking".into(),
                input_params: Value::Null,
                executor: Box::new(AlwaysSucceeds { tag: "booked" }),
                compensator: Box::new(NoopCompensator { ran: ran.clone() }),
            },
        );
        let outcome = orch.execute_saga(&saga_id).await;
        assert!(outcome.success);
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(outcome.steps[0].status, ActionStatus::Success);
    }

    #[tokio::test]
    async fn second_action_failure_compensates_first_in_reverse() {
        let orch = orchestrator();
        let saga_id = orch.create_saga("u1", "schedule_booking");
        let ran = Arc::new(AtomicBool::new(false));
        orch.add_action(
            &saga_id,
            PendingAction {
                action_type: "tool".into(),
                name: "create_booking".into(),
                input_params: Value::Null,
                executor: Box::new(AlwaysSucceeds { tag: "booked" }),
                compensator: Box::new(NoopCompensator { ran: ran.clone() }),
            },
        );
        orch.add_action(
            &saga_id,
            PendingAction {
                action_type: "tool".into(),
                name: "send_email".into(),
                input_params: Value::Null,
                executor: Box::new(AlwaysFails),
                compensator: Box::new(NoopCompensator { ran: Arc::new(AtomicBool::new(false)) }),
            },
        );

        let outcome = orch.execute_saga(&saga_id).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("backend unreachable"));
        assert!(ran.load(Ordering::SeqCst), "compensator for the successful booking must run");
        assert_eq!(outcome.steps[0].status, ActionStatus::Compensated);
        assert_eq!(outcome.steps[1].status, ActionStatus::Failed);
    }

    #[tokio::test]
    async fn executing_unknown_saga_id_reports_failure_without_panicking() {
        let orch = orchestrator();
        let outcome = orch.execute_saga("does-not-exist").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("unknown saga"));
    }
}
