use chrono::{DateTime, Utc};
use orc_core::types::Intent;
use serde_json::Value;

/// Request-scoped, mutable state threaded through every node of the
/// Orchestration Graph (§3 OrchestratorState).
///
/// Invariant: exactly one node writes `current_agent` at a time;
/// `handoff_completed=true` is terminal for the handoff branch.
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    // Immutable entries.
    pub question: String,
    pub user_id: String,
    pub company_id: String,
    pub chat_history: Vec<(String, String)>,
    pub context: String,

    // Classification.
    pub intent: Option<Intent>,
    pub confidence: f32,
    pub intent_keywords: Vec<String>,
    pub secondary_intent: Option<Intent>,
    pub secondary_confidence: f32,

    // Execution.
    pub current_agent: Option<Intent>,
    pub agent_response: Option<String>,
    pub agent_output: Option<Value>,

    // Coordination.
    pub handoff_requested: bool,
    pub handoff_from: Option<Intent>,
    pub handoff_to: Option<Intent>,
    pub handoff_reason: Option<String>,
    pub handoff_completed: bool,

    // Control.
    pub retries: u32,
    pub should_retry: bool,
    pub should_escalate: bool,
    pub tools_to_execute: Vec<String>,
    pub tools_executed: Vec<String>,
    pub tool_results: Vec<Value>,
    pub tool_errors: Vec<String>,

    // Bookkeeping.
    pub validations: Vec<String>,
    pub executions: Vec<String>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrchestratorState {
    pub fn new(question: impl Into<String>, user_id: impl Into<String>, company_id: impl Into<String>, context: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            question: question.into(),
            user_id: user_id.into(),
            company_id: company_id.into(),
            chat_history: Vec::new(),
            context: context.into(),
            intent: None,
            confidence: 0.0,
            intent_keywords: Vec::new(),
            secondary_intent: None,
            secondary_confidence: 0.0,
            current_agent: None,
            agent_response: None,
            agent_output: None,
            handoff_requested: false,
            handoff_from: None,
            handoff_to: None,
            handoff_reason: None,
            handoff_completed: false,
            retries: 0,
            should_retry: false,
            should_escalate: false,
            tools_to_execute: Vec::new(),
            tools_executed: Vec::new(),
            tool_results: Vec::new(),
            tool_errors: Vec::new(),
            validations: Vec::new(),
            executions: Vec::new(),
            errors: Vec::new(),
            started_at,
            completed_at: None,
        }
    }
}

/// Outcome returned to the webhook layer after a full graph run.
#[derive(Debug, Clone)]
pub struct GraphResult {
    pub reply: String,
    pub intent: Option<Intent>,
    pub handoff_occurred: bool,
    pub tools_executed: Vec<String>,
    pub errors: Vec<String>,
}
