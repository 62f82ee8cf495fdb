use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orc_adapter::AgentAdapter;
use orc_agents::{EmergencyHandler, RouterHandler, SalesHandler, ScheduleHandler, ScheduleOutput, SupportHandler};
use orc_core::config::{ScheduleBackendKind, TenantConfig};
use orc_core::types::{EmergencyInfo, Intent, PricingInfo, ScheduleInfo, ScheduleStatus, UrgencyLevel};
use orc_llm::LlmProvider;
use orc_prompt::PromptResolver;
use orc_retrieval::VectorIndex;
use orc_saga::{Compensator, Executor, PendingAction};
use orc_state::SharedStateStore;
use orc_tools::ToolExecutor;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::inputs;
use crate::secondary::detect_secondary_intent;
use crate::state::{GraphResult, OrchestratorState};
use crate::validate::{validate_cross_agent_info, validate_input, validate_output, GENERIC_ERROR_REPLY};

/// Hard cap on node transitions per request (§4.K, §8). Configurable only
/// for tests; production callers get the spec default.
pub const DEFAULT_MAX_TRANSITIONS: u32 = orc_core::config::MAX_GRAPH_TRANSITIONS;
const MAX_RETRIES: u32 = 2;
const HANDOFF_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    ClassifyIntent,
    DetectSecondaryIntent,
    ExecuteAgent(Intent),
    ValidateOutput,
    ExecuteBooking,
    CreateTicket,
    ValidateCrossAgent,
    HandleAgentHandoff,
    HandleRetry,
    End,
}

/// The per-tenant orchestration state machine (§4.K): classifies intent,
/// detects a secondary intent, dispatches to a specialist, validates
/// output, coordinates at most one handoff, and runs compensable tool
/// actions. Stateless across requests — all tenant and conversation data
/// arrives through [`OrchestrationGraph::run`].
pub struct OrchestrationGraph {
    router: AgentAdapter,
    specialists: HashMap<Intent, AgentAdapter>,
    tools: Arc<ToolExecutor>,
    saga: Arc<orc_saga::CompensationOrchestrator>,
    state_store: Arc<dyn SharedStateStore>,
    max_transitions: u32,
}

impl OrchestrationGraph {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        prompts: Arc<dyn PromptResolver>,
        retrieval: Arc<dyn VectorIndex>,
        tools: Arc<ToolExecutor>,
        saga: Arc<orc_saga::CompensationOrchestrator>,
        state_store: Arc<dyn SharedStateStore>,
    ) -> Self {
        let llm_timeout = Duration::from_secs(30);

        let router = AgentAdapter::new(
            Arc::new(RouterHandler::new(llm.clone(), prompts.clone())),
            "router",
            llm_timeout,
            MAX_RETRIES,
        );

        let mut specialists = HashMap::new();
        specialists.insert(
            Intent::Sales,
            AgentAdapter::new(
                Arc::new(SalesHandler::new(llm.clone(), prompts.clone(), retrieval.clone())),
                "sales",
                llm_timeout,
                MAX_RETRIES,
            ),
        );
        specialists.insert(
            Intent::Support,
            AgentAdapter::new(
                Arc::new(SupportHandler::new(llm.clone(), prompts.clone(), retrieval.clone())),
                "support",
                llm_timeout,
                MAX_RETRIES,
            ),
        );
        specialists.insert(
            Intent::Emergency,
            AgentAdapter::new(
                Arc::new(EmergencyHandler::new(llm.clone(), prompts.clone(), retrieval)),
                "emergency",
                llm_timeout,
                MAX_RETRIES,
            ),
        );
        specialists.insert(
            Intent::Schedule,
            AgentAdapter::new(
                Arc::new(ScheduleHandler::new(llm, prompts, tools.clone())),
                "schedule",
                llm_timeout,
                MAX_RETRIES,
            ),
        );

        Self {
            router,
            specialists,
            tools,
            saga,
            state_store,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
        }
    }

    #[cfg(test)]
    pub fn with_max_transitions(mut self, max_transitions: u32) -> Self {
        self.max_transitions = max_transitions;
        self
    }

    #[instrument(skip(self, tenant, chat_history), fields(company_id = %tenant.company_id, user_id))]
    pub async fn run(
        &self,
        tenant: &TenantConfig,
        question: &str,
        user_id: &str,
        conversation_id: &str,
        chat_history: Vec<(String, String)>,
        media_context: &str,
    ) -> GraphResult {
        let mut state = OrchestratorState::new(question, user_id, tenant.company_id.clone(), media_context, Utc::now());
        state.chat_history = chat_history;

        if let Err(reason) = validate_input(&state, &tenant.company_id) {
            state.errors.push(reason);
            return finish(state, GENERIC_ERROR_REPLY.to_string());
        }

        let mut node = Node::ClassifyIntent;
        let mut transitions: u32 = 0;

        loop {
            transitions += 1;
            if transitions > self.max_transitions {
                warn!(transitions, "orchestration graph exceeded recursion cap");
                state.errors.push("recursion cap exceeded".to_string());
                return finish(state, GENERIC_ERROR_REPLY.to_string());
            }

            node = match node {
                Node::ClassifyIntent => self.classify_intent(&mut state, tenant).await,
                Node::DetectSecondaryIntent => self.detect_secondary(&mut state, tenant),
                Node::ExecuteAgent(intent) => self.execute_agent(&mut state, tenant, intent, conversation_id).await,
                Node::ValidateOutput => self.route_after_validate_output(&mut state),
                Node::ExecuteBooking => self.execute_booking(&mut state, tenant, conversation_id).await,
                Node::CreateTicket => self.create_ticket(&mut state, tenant, conversation_id).await,
                Node::ValidateCrossAgent => self.validate_cross_agent(&mut state),
                Node::HandleAgentHandoff => self.handle_agent_handoff(&mut state),
                Node::HandleRetry => self.handle_retry(&mut state),
                Node::End => break,
            };
        }

        let reply = state.agent_response.clone().unwrap_or_else(|| GENERIC_ERROR_REPLY.to_string());
        finish(state, reply)
    }

    async fn classify_intent(&self, state: &mut OrchestratorState, tenant: &TenantConfig) -> Node {
        let input = inputs::router_input(state, tenant);
        let result = self.router.invoke(&input).await;
        state.executions.push("classify_intent".to_string());

        if !result.success {
            state.errors.push(result.error.unwrap_or_else(|| "router failed".to_string()));
            state.intent = Some(Intent::Support);
            state.confidence = 0.3;
            return Node::DetectSecondaryIntent;
        }

        let output = result.output.unwrap_or(Value::Null);
        let intent_str = output.get("intent").and_then(Value::as_str).unwrap_or("SUPPORT");
        let confidence = output.get("confidence").and_then(Value::as_f64).unwrap_or(0.3) as f32;
        let keywords = output
            .get("keywords")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let intent = if confidence > 0.7 {
            Intent::parse_canonical(intent_str).unwrap_or(Intent::Support)
        } else {
            Intent::Support
        };

        state.intent = Some(intent);
        state.confidence = confidence;
        state.intent_keywords = keywords;
        Node::DetectSecondaryIntent
    }

    fn detect_secondary(&self, state: &mut OrchestratorState, tenant: &TenantConfig) -> Node {
        let primary = state.intent.unwrap_or(Intent::Support);
        if let Some((secondary, confidence)) = detect_secondary_intent(&state.question, primary, &tenant.keywords) {
            state.secondary_intent = Some(secondary);
            state.secondary_confidence = confidence;
        }
        Node::ExecuteAgent(primary)
    }

    async fn execute_agent(&self, state: &mut OrchestratorState, tenant: &TenantConfig, intent: Intent, conversation_id: &str) -> Node {
        let input = match intent {
            Intent::Sales => inputs::sales_input(state, tenant),
            Intent::Support => inputs::support_input(state, tenant),
            Intent::Emergency => inputs::emergency_input(state, tenant),
            Intent::Schedule => inputs::schedule_input(state, tenant, conversation_id),
        };

        let Some(adapter) = self.specialists.get(&intent) else {
            state.errors.push(format!("no handler registered for {intent}"));
            state.agent_response = Some(GENERIC_ERROR_REPLY.to_string());
            return Node::End;
        };

        let result = adapter.invoke(&input).await;
        state.executions.push(format!("execute_{}", intent.as_lowercase()));
        state.current_agent = Some(intent);

        if !result.success {
            state.errors.push(result.error.unwrap_or_else(|| format!("{intent} handler failed")));
            state.agent_response = Some(String::new());
            state.should_retry = true;
            return Node::ValidateOutput;
        }

        let output = result.output.unwrap_or(Value::Null);
        let reply = output.get("reply").and_then(Value::as_str).unwrap_or_default().to_string();
        state.agent_response = Some(reply.clone());
        state.agent_output = Some(output.clone());

        self.persist_shared_context(state, tenant, intent, &output, &reply).await;

        Node::ValidateOutput
    }

    async fn persist_shared_context(&self, state: &OrchestratorState, tenant: &TenantConfig, intent: Intent, output: &Value, reply: &str) {
        let prefix = &tenant.redis_prefix;
        match intent {
            Intent::Sales => {
                let has_pricing = output.get("has_pricing").and_then(Value::as_bool).unwrap_or(false);
                if has_pricing {
                    let info = PricingInfo {
                        service_name: "unspecified".to_string(),
                        price: reply.to_string(),
                        currency: "COP".to_string(),
                        payment_methods: Vec::new(),
                        promotions: None,
                        source_agent: "sales".to_string(),
                        timestamp: Utc::now(),
                    };
                    if let Err(err) = self.state_store.set_pricing(prefix, &state.user_id, "unspecified", info).await {
                        warn!(error = %err, "failed to persist sales shared context");
                    }
                }
            }
            Intent::Emergency => {
                let info = EmergencyInfo {
                    symptoms: Vec::new(),
                    urgency_level: UrgencyLevel::High,
                    action_taken: Some("escalated".to_string()),
                    detected_by_agent: "emergency".to_string(),
                    timestamp: Utc::now(),
                };
                if let Err(err) = self.state_store.set_emergency(prefix, &state.user_id, info).await {
                    warn!(error = %err, "failed to persist emergency shared context");
                }
            }
            Intent::Schedule => {
                if let Ok(schedule_output) = serde_json::from_value::<ScheduleOutput>(output.clone()) {
                    let info = ScheduleInfo {
                        treatment: schedule_output.treatment.clone().unwrap_or_default(),
                        date: schedule_output.date.clone(),
                        time: schedule_output.available_slot_starts.first().cloned(),
                        patient_name: schedule_output.patient_name.clone(),
                        patient_phone: schedule_output.patient_phone.clone(),
                        status: ScheduleStatus::Pending,
                        booking_id: None,
                        source_agent: "schedule".to_string(),
                        timestamp: Utc::now(),
                    };
                    if let Err(err) = self.state_store.set_schedule(prefix, &state.user_id, info).await {
                        warn!(error = %err, "failed to persist schedule shared context");
                    }
                }
            }
            Intent::Support => {}
        }
    }

    /// Routing policy at `validate_output` (§4.K, numbered 1-6).
    fn route_after_validate_output(&self, state: &mut OrchestratorState) -> Node {
        let reply = state.agent_response.clone().unwrap_or_default();

        // 1. Loop prevention: a completed handoff always ends the request.
        if state.handoff_completed {
            return Node::End;
        }

        // 2. A strong, distinct secondary intent triggers the handoff branch.
        if let Some(secondary) = state.secondary_intent {
            if state.secondary_confidence >= HANDOFF_CONFIDENCE_THRESHOLD && Some(secondary) != state.current_agent {
                return Node::HandleAgentHandoff;
            }
        }

        // 3. Tool applicability.
        if state.current_agent == Some(Intent::Schedule) {
            if let Some(output) = &state.agent_output {
                if let Ok(schedule_output) = serde_json::from_value::<ScheduleOutput>(output.clone()) {
                    let ready_to_book = schedule_output.missing_fields.is_empty()
                        && !schedule_output.available_slot_starts.is_empty()
                        && !state.tools_executed.contains(&"create_booking".to_string());
                    if ready_to_book {
                        return Node::ExecuteBooking;
                    }
                }
            }
        }
        if state.current_agent == Some(Intent::Support) {
            if let Some(output) = &state.agent_output {
                let needs_ticket = output.get("needs_ticket").and_then(Value::as_bool).unwrap_or(false);
                if needs_ticket && !state.tools_executed.contains(&"create_ticket".to_string()) {
                    return Node::CreateTicket;
                }
            }
        }

        // 4. Schedule leaking pricing: flag but don't re-route through another agent.
        if state.current_agent == Some(Intent::Schedule) && (reply.contains('$') || reply.contains("COP")) {
            return Node::ValidateCrossAgent;
        }

        // 5. Retry on invalid output, bounded by MAX_RETRIES.
        if !validate_output(&reply) && state.retries < MAX_RETRIES {
            state.should_retry = true;
            return Node::HandleRetry;
        }

        // 6. Otherwise, end.
        Node::End
    }

    async fn execute_booking(&self, state: &mut OrchestratorState, tenant: &TenantConfig, conversation_id: &str) -> Node {
        let Some(output) = state.agent_output.clone() else {
            return Node::ValidateCrossAgent;
        };
        let Ok(schedule_output) = serde_json::from_value::<ScheduleOutput>(output) else {
            return Node::ValidateCrossAgent;
        };

        let saga_id = self.saga.create_saga(&state.user_id, "schedule_booking");

        let booking_params = json!({
            "action": "create_booking",
            "treatment": schedule_output.treatment,
            "date": schedule_output.date,
            "time": schedule_output.available_slot_starts.first(),
            "patient_name": schedule_output.patient_name,
            "patient_phone": schedule_output.patient_phone,
        });
        self.saga.add_action(
            &saga_id,
            PendingAction {
                action_type: "tool".to_string(),
                name: "create_booking".to_string(),
                input_params: booking_params,
                executor: Box::new(BookingExecutor {
                    tools: self.tools.clone(),
                    user_id: state.user_id.clone(),
                    conversation_id: conversation_id.to_string(),
                    company_id: tenant.company_id.clone(),
                    backend: tenant.schedule_backend.clone(),
                }),
                compensator: Box::new(BookingCompensator {
                    tools: self.tools.clone(),
                    user_id: state.user_id.clone(),
                    conversation_id: conversation_id.to_string(),
                    company_id: tenant.company_id.clone(),
                    backend: tenant.schedule_backend.clone(),
                }),
            },
        );

        let notification_params = json!({
            "to_email": schedule_output.patient_email,
            "template_name": "booking_confirmation",
            "template_vars": {
                "treatment": schedule_output.treatment,
                "date": schedule_output.date,
            },
        });
        self.saga.add_action(
            &saga_id,
            PendingAction {
                action_type: "tool".to_string(),
                name: "send_notification".to_string(),
                input_params: notification_params,
                executor: Box::new(NotificationExecutor {
                    tools: self.tools.clone(),
                    conversation_id: conversation_id.to_string(),
                    company_id: tenant.company_id.clone(),
                    backend: tenant.schedule_backend.clone(),
                }),
                compensator: Box::new(NoopCompensator),
            },
        );

        let outcome = self.saga.execute_saga(&saga_id).await;
        state.tools_executed.push("create_booking".to_string());
        state.tools_executed.push("send_notification".to_string());

        if outcome.success {
            state.tool_results.push(json!({"saga": "schedule_booking", "success": true}));
        } else {
            let err = outcome.error.unwrap_or_else(|| "booking saga failed".to_string());
            state.tool_errors.push(err.clone());
            state.agent_response = Some(format!(
                "{} Tuvimos un inconveniente confirmando tu cita; un asesor te contactará pronto.",
                state.agent_response.clone().unwrap_or_default()
            ));
        }

        Node::ValidateCrossAgent
    }

    async fn create_ticket(&self, state: &mut OrchestratorState, tenant: &TenantConfig, conversation_id: &str) -> Node {
        let params = json!({
            "subject": "Solicitud de soporte",
            "description": state.question,
            "priority": "medium",
            "requester_id": state.user_id,
        });
        let result = self
            .tools
            .execute("create_ticket", &params, &state.user_id, "support", conversation_id, &tenant.company_id, &tenant.schedule_backend)
            .await;

        state.tools_executed.push("create_ticket".to_string());
        if result.success {
            state.tool_results.push(result.data.unwrap_or(Value::Null));
        } else {
            state.tool_errors.push(result.error.unwrap_or_else(|| "create_ticket failed".to_string()));
        }

        Node::ValidateCrossAgent
    }

    fn validate_cross_agent(&self, state: &mut OrchestratorState) -> Node {
        if let Some(agent) = state.current_agent {
            let reply = state.agent_response.clone().unwrap_or_default();
            if let Some(warning) = validate_cross_agent_info(agent, &reply) {
                state.validations.push(warning);
            }
        }
        Node::End
    }

    /// `handle_agent_handoff` (§4.K): at most one per request.
    fn handle_agent_handoff(&self, state: &mut OrchestratorState) -> Node {
        let from = state.current_agent;
        let to = state.secondary_intent;
        state.handoff_requested = true;
        state.handoff_from = from;
        state.handoff_to = to;
        state.handoff_reason = Some(format!(
            "secondary intent {} detected with confidence {:.2}",
            to.map(|i| i.as_lowercase()).unwrap_or("unknown"),
            state.secondary_confidence
        ));
        state.handoff_completed = true;

        match to {
            Some(intent) => Node::ExecuteAgent(intent),
            None => Node::End,
        }
    }

    /// `handle_retry` (§4.K): escalate after `MAX_RETRIES`, or on an empty reply.
    fn handle_retry(&self, state: &mut OrchestratorState) -> Node {
        state.retries += 1;
        let reply_is_empty = state.agent_response.as_deref().unwrap_or("").is_empty();
        if state.retries >= MAX_RETRIES || reply_is_empty {
            state.should_escalate = true;
            return Node::ExecuteAgent(Intent::Support);
        }
        match state.current_agent {
            Some(intent) => Node::ExecuteAgent(intent),
            None => Node::ExecuteAgent(Intent::Support),
        }
    }
}

fn finish(mut state: OrchestratorState, reply: String) -> GraphResult {
    state.completed_at = Some(Utc::now());
    info!(intent = ?state.intent, handoff = state.handoff_requested, "orchestration graph run complete");
    GraphResult {
        reply,
        intent: state.intent,
        handoff_occurred: state.handoff_requested,
        tools_executed: state.tools_executed.clone(),
        errors: state.errors,
    }
}

struct BookingExecutor {
    tools: Arc<ToolExecutor>,
    user_id: String,
    conversation_id: String,
    company_id: String,
    backend: orc_core::config::ScheduleBackendConfig,
}

#[async_trait::async_trait]
impl Executor for BookingExecutor {
    async fn execute(&self, input_params: &Value) -> Result<Value, String> {
        let result = self
            .tools
            .execute("google_calendar", input_params, &self.user_id, "schedule", &self.conversation_id, &self.company_id, &self.backend)
            .await;
        if result.success {
            Ok(result.data.unwrap_or(Value::Null))
        } else {
            Err(result.error.unwrap_or_else(|| "create_booking failed".to_string()))
        }
    }
}

struct BookingCompensator {
    tools: Arc<ToolExecutor>,
    user_id: String,
    conversation_id: String,
    company_id: String,
    backend: orc_core::config::ScheduleBackendConfig,
}

#[async_trait::async_trait]
impl Compensator for BookingCompensator {
    async fn compensate(&self, _input_params: &Value, execute_result: &Value) -> Result<(), String> {
        let event_id = execute_result.get("event_id").cloned().unwrap_or(Value::Null);
        let params = json!({"action": "delete_event", "event_id": event_id});
        let result = self
            .tools
            .execute("google_calendar", &params, &self.user_id, "schedule", &self.conversation_id, &self.company_id, &self.backend)
            .await;
        if result.success {
            Ok(())
        } else {
            Err(result.error.unwrap_or_else(|| "delete_event failed".to_string()))
        }
    }
}

struct NotificationExecutor {
    tools: Arc<ToolExecutor>,
    conversation_id: String,
    company_id: String,
    backend: orc_core::config::ScheduleBackendConfig,
}

#[async_trait::async_trait]
impl Executor for NotificationExecutor {
    async fn execute(&self, input_params: &Value) -> Result<Value, String> {
        let result = self
            .tools
            .execute("send_email", input_params, "system", "schedule", &self.conversation_id, &self.company_id, &self.backend)
            .await;
        if result.success {
            Ok(result.data.unwrap_or(Value::Null))
        } else {
            Err(result.error.unwrap_or_else(|| "send_email failed".to_string()))
        }
    }
}

/// Failed notifications have nothing of their own to roll back — it's the
/// booking's compensator that runs (§8 scenario 6).
struct NoopCompensator;

#[async_trait::async_trait]
impl Compensator for NoopCompensator {
    async fn compensate(&self, _input_params: &Value, _execute_result: &Value) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_core::config::{ModelParams, ScheduleBackendConfig, TenantKeywords};
    use orc_llm::MockLlmProvider;
    use orc_prompt::StaticPromptResolver;
    use orc_retrieval::InMemoryVectorIndex;
    use orc_state::InMemoryStateStore;
    use rusqlite::Connection;
    use std::collections::HashMap;

    fn tenant() -> TenantConfig {
        TenantConfig {
            company_id: "acme".to_string(),
            display_name: "Acme Dental".to_string(),
            services: vec!["limpieza".to_string(), "blanqueamiento".to_string()],
            redis_prefix: "acme".to_string(),
            vector_index_name: "acme-index".to_string(),
            schedule_backend: ScheduleBackendConfig {
                url: "https://schedule.example.com".to_string(),
                kind: ScheduleBackendKind::Generic,
            },
            treatment_durations: HashMap::new(),
            keywords: TenantKeywords {
                emergency: vec!["sangrado".to_string()],
                sales: vec!["precio".to_string()],
                schedule: vec!["cita".to_string()],
                support: vec!["ayuda".to_string()],
            },
            required_booking_fields: vec!["date".to_string(), "treatment".to_string()],
            model_params: ModelParams::default(),
            max_context_messages: 10,
            chatwoot: orc_core::config::ChatwootConfig {
                base_url: "https://chatwoot.example.com".to_string(),
                account_id: "1".to_string(),
                api_access_token: "test-token".to_string(),
            },
        }
    }

    fn build_graph(mock: MockLlmProvider) -> OrchestrationGraph {
        let llm: Arc<dyn LlmProvider> = Arc::new(mock);
        let prompts: Arc<dyn PromptResolver> = Arc::new(StaticPromptResolver::empty());
        let retrieval: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::empty());
        let tools = Arc::new(ToolExecutor::new());
        let conn = Connection::open_in_memory().unwrap();
        orc_audit::init_db(&conn).unwrap();
        let audit = orc_audit::AuditLog::new(conn);
        let saga = Arc::new(orc_saga::CompensationOrchestrator::new(audit));
        let state_store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new(3600));
        OrchestrationGraph::new(llm, prompts, retrieval, tools, saga, state_store)
    }

    fn router_reply(intent: &str, confidence: f32) -> String {
        json!({"intent": intent, "confidence": confidence, "keywords": [], "reasoning": "test"}).to_string()
    }

    #[tokio::test]
    async fn sales_question_is_routed_and_gets_a_cta() {
        let mock = MockLlmProvider::new();
        mock.push_responses(vec![
            "El blanqueamiento tiene excelentes resultados.",
            &router_reply("SALES", 0.9),
        ]);
        let graph = build_graph(mock);
        let tenant = tenant();

        let result = graph.run(&tenant, "¿Cuánto cuesta el blanqueamiento?", "user-1", "conv-1", Vec::new(), "").await;

        assert_eq!(result.intent, Some(Intent::Sales));
        assert!(result.reply.contains("agendar"));
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn emergency_question_always_ends_with_escalation_line() {
        let mock = MockLlmProvider::new();
        mock.push_responses(vec![
            "Mantén presión en la zona mientras llegas.",
            &router_reply("EMERGENCY", 0.95),
        ]);
        let graph = build_graph(mock);
        let tenant = tenant();

        let result = graph.run(&tenant, "tengo sangrado abundante", "user-2", "conv-2", Vec::new(), "").await;

        assert_eq!(result.intent, Some(Intent::Emergency));
        assert!(result.reply.contains("Escalando tu caso de emergencia"));
    }

    #[tokio::test]
    async fn secondary_schedule_intent_triggers_exactly_one_handoff() {
        let mock = MockLlmProvider::new();
        // Consumed in order: router, support, schedule.
        mock.push_responses(vec![
            "Claro, dime qué fecha y tratamiento prefieres.",
            "Con gusto te ayudo con tu consulta de soporte.",
            &router_reply("SUPPORT", 0.9),
        ]);
        let graph = build_graph(mock);
        let tenant = tenant();

        let result = graph
            .run(&tenant, "tengo un problema y quiero saber sobre la cita", "user-3", "conv-3", Vec::new(), "")
            .await;

        // Primary classified SUPPORT, secondary SCHEDULE (>=0.7) triggers one
        // handoff; `handoff_completed` then prevents any further hops.
        assert_eq!(result.intent, Some(Intent::Support));
        assert!(result.handoff_occurred);
    }

    #[tokio::test]
    async fn recursion_cap_short_circuits_to_the_generic_error_reply() {
        let mock = MockLlmProvider::new();
        let graph = build_graph(mock).with_max_transitions(0);
        let tenant = tenant();

        let result = graph.run(&tenant, "hola", "user-4", "conv-4", Vec::new(), "").await;

        assert_eq!(result.reply, GENERIC_ERROR_REPLY);
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn empty_question_fails_input_validation_before_any_node_runs() {
        let mock = MockLlmProvider::new();
        let graph = build_graph(mock);
        let tenant = tenant();

        let result = graph.run(&tenant, "", "user-5", "conv-5", Vec::new(), "").await;

        assert_eq!(result.reply, GENERIC_ERROR_REPLY);
        assert!(!result.errors.is_empty());
    }
}
