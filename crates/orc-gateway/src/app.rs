use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use orc_webhook::WebhookState;

/// Assemble the full Axum router: the Chatwoot webhook ingress (§4.L) plus
/// a liveness probe.
pub fn build_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook/chatwoot", post(orc_webhook::webhook_handler))
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
