use std::sync::Arc;

use tracing::warn;

use crate::idempotency::IdempotencyStore;
use crate::memory::InMemoryStateStore;
use crate::redis_store::RedisStateStore;
use crate::store::SharedStateStore;

/// Both state-store traits backed by the same concrete connection. Both
/// `InMemoryStateStore` and `RedisStateStore` implement `SharedStateStore`
/// and `IdempotencyStore`; callers need both, so `build_state_store` hands
/// out two trait-object handles onto the one instance.
pub struct StateBackends {
    pub shared: Arc<dyn SharedStateStore>,
    pub idempotency: Arc<dyn IdempotencyStore>,
}

/// Build the shared-state backend per §4.D's failure mode: try Redis if a
/// URL is configured, and fall back to the in-memory backend — logging a
/// warning, never failing startup — if the URL is absent or the connection
/// attempt errors.
pub async fn build_state_store(redis_url: Option<&str>, default_ttl_secs: u64) -> StateBackends {
    match redis_url {
        Some(url) => match RedisStateStore::connect(url, default_ttl_secs).await {
            Ok(store) => {
                let store = Arc::new(store);
                StateBackends {
                    shared: store.clone(),
                    idempotency: store,
                }
            }
            Err(err) => {
                warn!(error = %err, "redis unavailable, falling back to in-memory shared state");
                let store = Arc::new(InMemoryStateStore::new(default_ttl_secs));
                StateBackends {
                    shared: store.clone(),
                    idempotency: store,
                }
            }
        },
        None => {
            warn!("no redis url configured, using in-memory shared state");
            let store = Arc::new(InMemoryStateStore::new(default_ttl_secs));
            StateBackends {
                shared: store.clone(),
                idempotency: store,
            }
        }
    }
}
