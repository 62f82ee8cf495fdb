//! `POST /webhook/chatwoot` (§4.L, §6). Grounded on the teacher's
//! `webhook_handler`: verify/gate → parse → forward → typed-error-tuple
//! response, with a `warn!`-logged helper for each rejection path. The
//! teacher's per-source HMAC/Bearer auth has no analogue here — Chatwoot
//! webhooks are gated by idempotency and bot-status instead.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use orc_core::config::{BOT_STATUS_TTL_SECS, PROCESSED_MESSAGE_TTL_SECS};
use orc_graph::OrchestrationGraph;
use orc_memory::{MemoryManager, Role};
use orc_state::IdempotencyStore;
use orc_tenant::TenantRegistry;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::outbound;
use crate::payload;

/// Everything the handler needs, aggregated so `orc-gateway` can build one
/// and hand it to axum via `.with_state(...)`.
pub struct WebhookState {
    pub tenants: Arc<TenantRegistry>,
    pub memory: Arc<MemoryManager>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub graph: Arc<OrchestrationGraph>,
    pub http: reqwest::Client,
    /// Conversation statuses that keep the bot active (`OrcConfig::gateway.bot_active_statuses`).
    pub bot_active_statuses: Vec<String>,
}

type JsonError = (StatusCode, Json<Value>);

pub async fn webhook_handler(State(state): State<Arc<WebhookState>>, Json(payload): Json<Value>) -> Result<Json<Value>, JsonError> {
    let Some(event) = payload::event_type(&payload) else {
        return Err(bad_request("missing event type"));
    };

    let company_id = state.tenants.resolve(&payload);
    let Some(tenant) = state.tenants.get(&company_id) else {
        warn!(company_id, "webhook resolved to an unregistered tenant");
        return Err(bad_request("unknown tenant"));
    };

    match event {
        "conversation_updated" => handle_conversation_updated(&state, &tenant.redis_prefix, &payload).await,
        "message_created" => handle_message_created(&state, &company_id, &tenant, &payload).await,
        other => {
            info!(event = other, "ignoring unhandled webhook event type");
            Ok(Json(json!({"status": "ok", "action": "ignored"})))
        }
    }
}

async fn handle_conversation_updated(state: &WebhookState, redis_prefix: &str, payload: &Value) -> Result<Json<Value>, JsonError> {
    let Some(conversation_id) = payload::conversation_id(payload) else {
        return Err(bad_request("missing conversation"));
    };
    let status = payload::conversation_status(payload).unwrap_or("");
    let active = state.bot_active_statuses.iter().any(|s| s == status);

    state
        .idempotency
        .set_bot_active(redis_prefix, &conversation_id, active, BOT_STATUS_TTL_SECS as u64)
        .await
        .map_err(|e| internal_error(&e.to_string()))?;

    Ok(Json(json!({"status": "ok", "action": "bot_status_updated", "active": active})))
}

async fn handle_message_created(
    state: &WebhookState,
    company_id: &str,
    tenant: &orc_core::config::TenantConfig,
    payload: &Value,
) -> Result<Json<Value>, JsonError> {
    let Some(conversation_id) = payload::conversation_id(payload) else {
        return Err(bad_request("missing conversation"));
    };

    if !payload::is_incoming_message(payload) {
        return Ok(Json(json!({"status": "ok", "action": "ignored_non_incoming"})));
    }

    let bot_active = state
        .idempotency
        .get_bot_active(&tenant.redis_prefix, &conversation_id)
        .await
        .map_err(|e| internal_error(&e.to_string()))?
        .unwrap_or(true);
    if !bot_active {
        return Ok(Json(json!({"status": "ok", "action": "bot_inactive"})));
    }

    let Some(message_id) = payload::message_id(payload) else {
        return Err(bad_request("missing message id"));
    };
    let claimed = state
        .idempotency
        .claim_message(&tenant.redis_prefix, &conversation_id, &message_id, PROCESSED_MESSAGE_TTL_SECS as u64)
        .await
        .map_err(|e| internal_error(&e.to_string()))?;
    if !claimed {
        return Ok(Json(json!({"status": "ok", "action": "duplicate"})));
    }

    let Some(contact_id) = payload::extract_contact_id(payload) else {
        return Err(bad_request("could not determine contact"));
    };
    let user_id = format!("{company_id}_contact_{contact_id}");
    let media_context = payload::media_context(payload);
    let question = payload::content(payload);

    let history = state
        .memory
        .get(company_id, &user_id)
        .map_err(|e| internal_error(&e.to_string()))?
        .into_iter()
        .map(|m| (m.role.to_string(), m.content))
        .collect();

    let result = state
        .graph
        .run(tenant, question, &user_id, &conversation_id, history, &media_context)
        .await;

    if let Err(e) = state.memory.append(company_id, &user_id, Role::User, question, tenant.max_context_messages) {
        warn!(error = %e, "failed to persist user turn to conversation memory");
    }
    if let Err(e) = state
        .memory
        .append(company_id, &user_id, Role::Assistant, &result.reply, tenant.max_context_messages)
    {
        warn!(error = %e, "failed to persist assistant turn to conversation memory");
    }

    if let Err(e) = outbound::send_reply(&state.http, &tenant.chatwoot, &conversation_id, &result.reply).await {
        warn!(error = %e, conversation_id, "failed to deliver reply to platform");
    }

    info!(company_id, user_id, intent = ?result.intent, "webhook message processed");
    Ok(Json(json!({
        "status": "ok",
        "action": "processed",
        "intent": result.intent,
        "handoff_occurred": result.handoff_occurred,
    })))
}

fn bad_request(reason: &str) -> JsonError {
    warn!(reason, "rejecting malformed webhook payload");
    (StatusCode::BAD_REQUEST, Json(json!({"error": "malformed payload", "reason": reason})))
}

fn internal_error(reason: &str) -> JsonError {
    warn!(reason, "webhook processing failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal error"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use orc_core::config::{ChatwootConfig, ModelParams, ScheduleBackendConfig, ScheduleBackendKind, TenantKeywords};
    use orc_llm::{LlmProvider, MockLlmProvider};
    use orc_prompt::{PromptResolver, StaticPromptResolver};
    use orc_retrieval::{InMemoryVectorIndex, VectorIndex};
    use orc_state::{InMemoryStateStore, SharedStateStore};
    use rusqlite::Connection;
    use serde_json::json;

    fn tenant_config() -> orc_core::config::TenantConfig {
        orc_core::config::TenantConfig {
            company_id: "acme".to_string(),
            display_name: "Acme Dental".to_string(),
            services: vec![],
            redis_prefix: "acme:".to_string(),
            vector_index_name: "acme-index".to_string(),
            schedule_backend: ScheduleBackendConfig {
                url: "https://schedule.example.com".to_string(),
                kind: ScheduleBackendKind::Generic,
            },
            treatment_durations: HashMap::new(),
            keywords: TenantKeywords::default(),
            required_booking_fields: vec![],
            model_params: ModelParams::default(),
            max_context_messages: 10,
            chatwoot: ChatwootConfig {
                base_url: "https://chatwoot.example.com".to_string(),
                account_id: "1".to_string(),
                api_access_token: "test-token".to_string(),
            },
        }
    }

    fn registry() -> Arc<TenantRegistry> {
        let mut tenants = HashMap::new();
        tenants.insert("acme".to_string(), tenant_config());
        Arc::new(TenantRegistry::new(tenants, HashMap::new()))
    }

    fn router_reply(intent: &str, confidence: f32) -> String {
        json!({"intent": intent, "confidence": confidence, "keywords": [], "reasoning": "test"}).to_string()
    }

    fn state_with(mock: MockLlmProvider) -> Arc<WebhookState> {
        let llm: Arc<dyn LlmProvider> = Arc::new(mock);
        let prompts: Arc<dyn PromptResolver> = Arc::new(StaticPromptResolver::empty());
        let retrieval: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::empty());
        let tools = Arc::new(orc_tools::ToolExecutor::new());
        let conn = Connection::open_in_memory().unwrap();
        orc_audit::init_db(&conn).unwrap();
        let audit = orc_audit::AuditLog::new(conn);
        let saga = Arc::new(orc_saga::CompensationOrchestrator::new(audit));
        let state_store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new(3600));
        let graph = Arc::new(OrchestrationGraph::new(llm, prompts, retrieval, tools, saga, state_store));

        let mem_conn = Connection::open_in_memory().unwrap();
        orc_memory::init_db(&mem_conn).unwrap();
        let memory = Arc::new(MemoryManager::new(mem_conn, 7 * 24 * 3600));

        let idempotency: Arc<dyn IdempotencyStore> = Arc::new(InMemoryStateStore::new(3600));

        Arc::new(WebhookState {
            tenants: registry(),
            memory,
            idempotency,
            graph,
            http: reqwest::Client::new(),
            bot_active_statuses: vec!["open".to_string()],
        })
    }

    fn message_created(conversation_id: i64, message_id: i64, content: &str, contact_id: i64) -> Value {
        json!({
            "event": "message_created",
            "company_id": "acme",
            "id": message_id,
            "message_type": "incoming",
            "content": content,
            "conversation": {
                "id": conversation_id,
                "status": "open",
                "contact_inbox": {"contact_id": contact_id},
            },
            "sender": {"id": contact_id, "type": "contact"},
        })
    }

    #[tokio::test]
    async fn message_created_is_routed_and_acknowledged() {
        let mock = MockLlmProvider::new();
        mock.push_responses(vec!["Claro, dime qué tratamiento buscas.", &router_reply("SALES", 0.9)]);
        let state = state_with(mock);
        let payload = message_created(10, 100, "¿cuánto cuesta?", 5);

        let Json(body) = webhook_handler(State(state), Json(payload)).await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["action"], "processed");
    }

    #[tokio::test]
    async fn duplicate_message_id_is_acknowledged_without_rerunning_the_graph() {
        let mock = MockLlmProvider::new();
        mock.push_responses(vec!["primera respuesta", &router_reply("SALES", 0.9)]);
        let state = state_with(mock);
        let payload = message_created(20, 200, "hola", 6);

        let first = webhook_handler(State(state.clone()), Json(payload.clone())).await.unwrap();
        assert_eq!(first.0["action"], "processed");

        let second = webhook_handler(State(state), Json(payload)).await.unwrap();
        assert_eq!(second.0["action"], "duplicate");
    }

    #[tokio::test]
    async fn inactive_bot_status_suppresses_the_reply() {
        let mock = MockLlmProvider::new();
        let state = state_with(mock);
        state
            .idempotency
            .set_bot_active("acme:", "30", false, 86400)
            .await
            .unwrap();
        let payload = message_created(30, 300, "hola", 7);

        let result = webhook_handler(State(state), Json(payload)).await.unwrap();
        assert_eq!(result.0["action"], "bot_inactive");
    }

    #[tokio::test]
    async fn conversation_updated_sets_status_without_a_reply() {
        let mock = MockLlmProvider::new();
        let state = state_with(mock);
        let payload = json!({
            "event": "conversation_updated",
            "company_id": "acme",
            "conversation": {"id": 40, "status": "resolved"},
        });

        let result = webhook_handler(State(state.clone()), Json(payload)).await.unwrap();
        assert_eq!(result.0["action"], "bot_status_updated");
        assert_eq!(result.0["active"], false);

        let active = state.idempotency.get_bot_active("acme:", "40").await.unwrap();
        assert_eq!(active, Some(false));
    }

    #[tokio::test]
    async fn non_incoming_message_is_ignored() {
        let mock = MockLlmProvider::new();
        let state = state_with(mock);
        let payload = json!({
            "event": "message_created",
            "company_id": "acme",
            "id": 500,
            "message_type": "outgoing",
            "content": "agent reply",
            "conversation": {"id": 50, "status": "open"},
        });

        let result = webhook_handler(State(state), Json(payload)).await.unwrap();
        assert_eq!(result.0["action"], "ignored_non_incoming");
    }

    #[tokio::test]
    async fn missing_conversation_is_rejected_as_malformed() {
        let mock = MockLlmProvider::new();
        let state = state_with(mock);
        let payload = json!({"event": "message_created", "message_type": "incoming"});

        let err = webhook_handler(State(state), Json(payload)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
