use std::net::SocketAddr;
use std::sync::Arc;

use orc_core::config::OrcConfig;
use orc_llm::{LlmProvider, OpenAiCompatibleProvider};
use orc_memory::MemoryManager;
use orc_prompt::{PromptResolver, StaticPromptResolver};
use orc_retrieval::{InMemoryVectorIndex, VectorIndex};
use orc_saga::CompensationOrchestrator;
use orc_tenant::TenantRegistry;
use orc_tools::ToolExecutor;
use orc_webhook::WebhookState;
use rusqlite::Connection;
use tracing::{info, warn};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orc_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit ORC_CONFIG env var > ~/.orc/orc.toml
    let config_path = std::env::var("ORC_CONFIG").ok();
    let config = OrcConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        OrcConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let bot_active_statuses = config.gateway.bot_active_statuses.clone();

    let conn = Connection::open(&config.database.path)?;
    orc_memory::init_db(&conn)?;
    let memory = Arc::new(MemoryManager::new(conn, orc_core::config::DEFAULT_MEMORY_TTL_SECS));

    let backends = orc_state::build_state_store(config.redis.url.as_deref(), orc_core::config::DEFAULT_SHARED_STATE_TTL_SECS as u64).await;

    let audit_conn = Connection::open(&config.database.path)?;
    orc_audit::init_db(&audit_conn)?;
    let audit = orc_audit::AuditLog::new(audit_conn);
    let saga = Arc::new(CompensationOrchestrator::new(audit));

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
        config.llm.provider_name.clone(),
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    ));
    // The tenant-authored Prompt Store and the semantic Retrieval Index are
    // out-of-scope collaborators (§1); both resolvers degrade safely to
    // their empty/hardcoded tiers until those services are wired in.
    let prompts: Arc<dyn PromptResolver> = Arc::new(StaticPromptResolver::empty());
    let retrieval: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::empty());
    let tools = Arc::new(ToolExecutor::new());

    let graph = Arc::new(orc_graph::OrchestrationGraph::new(llm, prompts, retrieval, tools, saga, backends.shared));

    let tenants = Arc::new(TenantRegistry::new(config.tenants.clone(), config.account_id_map.clone()));

    let state = Arc::new(WebhookState {
        tenants,
        memory,
        idempotency: backends.idempotency,
        graph,
        http: reqwest::Client::new(),
        bot_active_statuses,
    });

    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("orc gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to install ctrl_c signal handler");
    }
    info!("shutdown signal received");
}
