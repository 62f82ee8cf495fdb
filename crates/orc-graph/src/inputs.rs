use orc_core::config::TenantConfig;
use serde_json::{json, Value};

use crate::state::OrchestratorState;

fn history_pairs(state: &OrchestratorState) -> Vec<Value> {
    state
        .chat_history
        .iter()
        .map(|(role, content)| json!([role, content]))
        .collect()
}

pub fn router_input(state: &OrchestratorState, tenant: &TenantConfig) -> Value {
    json!({
        "question": state.question,
        "chat_history": history_pairs(state),
        "company_id": tenant.company_id,
        "company_name": tenant.display_name,
        "services": tenant.services,
        "emergency_keywords": tenant.keywords.emergency,
        "sales_keywords": tenant.keywords.sales,
        "schedule_keywords": tenant.keywords.schedule,
        "model_name": tenant.model_params.model_name,
        "max_tokens": tenant.model_params.max_tokens,
        "temperature": tenant.model_params.temperature,
    })
}

pub fn sales_input(state: &OrchestratorState, tenant: &TenantConfig) -> Value {
    json!({
        "question": state.question,
        "chat_history": history_pairs(state),
        "company_id": tenant.company_id,
        "company_name": tenant.display_name,
        "services": tenant.services,
        "vector_index_name": tenant.vector_index_name,
        "model_name": tenant.model_params.model_name,
        "max_tokens": tenant.model_params.max_tokens,
        "temperature": tenant.model_params.temperature,
    })
}

pub fn support_input(state: &OrchestratorState, tenant: &TenantConfig) -> Value {
    json!({
        "question": state.question,
        "chat_history": history_pairs(state),
        "company_id": tenant.company_id,
        "company_name": tenant.display_name,
        "services": tenant.services,
        "vector_index_name": tenant.vector_index_name,
        "model_name": tenant.model_params.model_name,
        "max_tokens": tenant.model_params.max_tokens,
        "temperature": tenant.model_params.temperature,
    })
}

pub fn emergency_input(state: &OrchestratorState, tenant: &TenantConfig) -> Value {
    json!({
        "question": state.question,
        "chat_history": history_pairs(state),
        "company_id": tenant.company_id,
        "company_name": tenant.display_name,
        "services": tenant.services,
        "vector_index_name": tenant.vector_index_name,
        "emergency_keywords": tenant.keywords.emergency,
        "model_name": tenant.model_params.model_name,
        "max_tokens": tenant.model_params.max_tokens,
        "temperature": tenant.model_params.temperature,
    })
}

pub fn schedule_input(state: &OrchestratorState, tenant: &TenantConfig, conversation_id: &str) -> Value {
    json!({
        "question": state.question,
        "chat_history": history_pairs(state),
        "user_id": state.user_id,
        "conversation_id": conversation_id,
        "company_id": tenant.company_id,
        "company_name": tenant.display_name,
        "treatment_durations": tenant.treatment_durations,
        "required_booking_fields": tenant.required_booking_fields,
        "schedule_backend": tenant.schedule_backend,
        "model_name": tenant.model_params.model_name,
        "max_tokens": tenant.model_params.max_tokens,
        "temperature": tenant.model_params.temperature,
    })
}
