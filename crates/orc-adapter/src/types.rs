use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub retries: u32,
    pub status: ExecutionStatus,
}

/// Outcome of an output validator. A `false` `valid` does not fail the
/// invocation (§4.E: "warnings don't fail") — it's surfaced for the caller
/// to act on if it chooses to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub execution_state: ExecutionState,
    pub validation: Option<ValidationOutcome>,
    pub retries: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdapterStatsSnapshot {
    pub total_executions: u64,
    pub total_errors: u64,
    pub total_duration_ms: u64,
    pub error_rate: f64,
}
