use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use orc_webhook::WebhookState;
use serde_json::{json, Value};

/// `GET /health` — liveness probe.
pub async fn health_handler(State(state): State<Arc<WebhookState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "bot_active_statuses": state.bot_active_statuses,
    }))
}
