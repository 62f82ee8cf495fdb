use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Compensated,
}

/// One side-effecting step within a saga, paired with its rollback (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_type: String,
    pub name: String,
    pub input_params: Value,
    pub status: ActionStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saga {
    pub saga_id: String,
    pub user_id: String,
    pub saga_name: String,
    pub actions: Vec<ActionRecord>,
}

impl Saga {
    pub fn new(saga_id: String, user_id: impl Into<String>, saga_name: impl Into<String>) -> Self {
        Self {
            saga_id,
            user_id: user_id.into(),
            saga_name: saga_name.into(),
            actions: Vec::new(),
        }
    }
}

/// Outcome of `ExecuteSaga` (§4.J): whether the whole saga succeeded, and
/// a per-action trace a caller can surface to the user or log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub steps: Vec<ActionRecord>,
}
