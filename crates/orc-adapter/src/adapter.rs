use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::handler::Handler;
use crate::stats::AdapterStats;
use crate::types::{AdapterStatsSnapshot, ExecutionState, ExecutionStatus, InvokeResult, ValidationOutcome};

pub type InputValidator = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;
pub type OutputValidator = Box<dyn Fn(&Value) -> ValidationOutcome + Send + Sync>;

/// Uniform wrapper around a [`Handler`]: timing, retries with exponential
/// backoff, input/output validation, and invocation statistics (§4.E).
///
/// Generalized from the teacher's `ProviderRouter`, which retries a single
/// provider slot before failing over to the next — here there is exactly
/// one handler per adapter, so the retry loop is the whole story.
pub struct AgentAdapter {
    handler: Arc<dyn Handler>,
    agent_name: String,
    timeout: Duration,
    max_retries: u32,
    base_delay: Duration,
    validate_input: Option<InputValidator>,
    validate_output: Option<OutputValidator>,
    stats: AdapterStats,
}

impl AgentAdapter {
    pub fn new(handler: Arc<dyn Handler>, agent_name: impl Into<String>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            handler,
            agent_name: agent_name.into(),
            timeout,
            max_retries,
            base_delay: Duration::from_secs(1),
            validate_input: None,
            validate_output: None,
            stats: AdapterStats::default(),
        }
    }

    /// Test seam: the spec's backoff is `2^attempt` seconds, which is too
    /// slow for a test suite to actually wait through. Production callers
    /// should leave this at the default of one second.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_input_validator(mut self, validator: InputValidator) -> Self {
        self.validate_input = Some(validator);
        self
    }

    pub fn with_output_validator(mut self, validator: OutputValidator) -> Self {
        self.validate_output = Some(validator);
        self
    }

    pub fn stats(&self) -> AdapterStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn invoke(&self, inputs: &Value) -> InvokeResult {
        let started_at = Utc::now();

        if let Some(validate_input) = &self.validate_input {
            if let Err(reason) = validate_input(inputs) {
                let completed_at = Utc::now();
                self.stats.record(0, true);
                return InvokeResult {
                    success: false,
                    output: None,
                    error: Some(reason),
                    execution_state: ExecutionState {
                        started_at,
                        completed_at,
                        duration_ms: 0,
                        retries: 0,
                        status: ExecutionStatus::Failed,
                    },
                    validation: None,
                    retries: 0,
                };
            }
        }

        let mut last_error: Option<String> = None;
        let mut retries = 0u32;

        for attempt in 0..=self.max_retries {
            retries = attempt;
            match tokio::time::timeout(self.timeout, self.handler.invoke(inputs)).await {
                Ok(Ok(output)) => {
                    if attempt > 0 {
                        info!(agent = %self.agent_name, attempt, "handler succeeded after retry");
                    }
                    let validation = self.validate_output.as_ref().map(|validate| validate(&output));
                    let completed_at = Utc::now();
                    let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
                    self.stats.record(duration_ms, false);
                    return InvokeResult {
                        success: true,
                        output: Some(output),
                        error: None,
                        execution_state: ExecutionState {
                            started_at,
                            completed_at,
                            duration_ms,
                            retries: attempt,
                            status: ExecutionStatus::Success,
                        },
                        validation,
                        retries: attempt,
                    };
                }
                Ok(Err(err)) => {
                    warn!(agent = %self.agent_name, attempt, err = %err, "handler invocation failed");
                    last_error = Some(err.to_string());
                }
                Err(_) => {
                    warn!(agent = %self.agent_name, attempt, "handler invocation timed out");
                    last_error = Some(format!("timed out after {}ms", self.timeout.as_millis()));
                }
            }

            if attempt < self.max_retries {
                let delay = self.base_delay * 2u32.pow(attempt);
                tokio::time::sleep(delay).await;
            }
        }

        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        self.stats.record(duration_ms, true);
        InvokeResult {
            success: false,
            output: None,
            error: last_error,
            execution_state: ExecutionState {
                started_at,
                completed_at,
                duration_ms,
                retries,
                status: ExecutionStatus::Failed,
            },
            validation: None,
            retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orc_core::OrcError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysOk;
    #[async_trait]
    impl Handler for AlwaysOk {
        async fn invoke(&self, inputs: &Value) -> Result<Value, OrcError> {
            Ok(inputs.clone())
        }
    }

    struct FailNTimes {
        remaining: AtomicU32,
    }
    #[async_trait]
    impl Handler for FailNTimes {
        async fn invoke(&self, _inputs: &Value) -> Result<Value, OrcError> {
            if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(OrcError::Internal("transient failure".to_string()))
            } else {
                Ok(json!({"ok": true}))
            }
        }
    }

    fn fast_adapter(handler: Arc<dyn Handler>, max_retries: u32) -> AgentAdapter {
        AgentAdapter::new(handler, "test-agent", Duration::from_secs(5), max_retries)
            .with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let adapter = fast_adapter(Arc::new(AlwaysOk), 2);
        let result = adapter.invoke(&json!({"a": 1})).await;
        assert!(result.success);
        assert_eq!(result.retries, 0);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let handler = Arc::new(FailNTimes { remaining: AtomicU32::new(2) });
        let adapter = fast_adapter(handler, 3);
        let result = adapter.invoke(&json!({})).await;
        assert!(result.success);
        assert_eq!(result.retries, 2);
    }

    #[tokio::test]
    async fn exhausts_retries_and_fails() {
        let handler = Arc::new(FailNTimes { remaining: AtomicU32::new(99) });
        let adapter = fast_adapter(handler, 1);
        let result = adapter.invoke(&json!({})).await;
        assert!(!result.success);
        assert_eq!(result.retries, 1);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn input_validator_rejects_before_invoking_handler() {
        let adapter = fast_adapter(Arc::new(AlwaysOk), 2)
            .with_input_validator(Box::new(|v| {
                if v.get("question").is_some() {
                    Ok(())
                } else {
                    Err("missing question".to_string())
                }
            }));
        let result = adapter.invoke(&json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("missing question"));
        assert_eq!(result.retries, 0);
    }

    #[tokio::test]
    async fn output_validator_warnings_do_not_fail_invocation() {
        let adapter = fast_adapter(Arc::new(AlwaysOk), 0).with_output_validator(Box::new(|_| ValidationOutcome {
            valid: false,
            warnings: vec!["reply too long".to_string()],
        }));
        let result = adapter.invoke(&json!({"question": "hi"})).await;
        assert!(result.success);
        assert_eq!(result.validation.unwrap().warnings.len(), 1);
    }

    #[tokio::test]
    async fn stats_accumulate_across_invocations() {
        let adapter = fast_adapter(Arc::new(AlwaysOk), 0);
        adapter.invoke(&json!({})).await;
        adapter.invoke(&json!({})).await;
        let snapshot = adapter.stats();
        assert_eq!(snapshot.total_executions, 2);
        assert_eq!(snapshot.error_rate, 0.0);
    }
}
