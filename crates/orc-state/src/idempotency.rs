//! `ProcessedMessageKey` / `BotStatusKey` (§3): plain TTL'd flags used by the
//! webhook ingress for duplicate suppression and pause/resume. Kept apart
//! from [`crate::SharedStateStore`]'s typed SharedContext slots since these
//! carry no structured payload and each call supplies its own TTL instead of
//! the backend's default.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claims `processed_message:{conversation_id}:{message_id}`.
    /// Returns `true` the first time a given message is seen, `false` if it
    /// was already claimed (duplicate webhook delivery, §4.L).
    async fn claim_message(
        &self,
        prefix: &str,
        conversation_id: &str,
        message_id: &str,
        ttl_secs: u64,
    ) -> Result<bool>;

    /// `None` means no status was ever recorded for this conversation —
    /// callers must treat that as active (bot enabled by default).
    async fn get_bot_active(&self, prefix: &str, conversation_id: &str) -> Result<Option<bool>>;

    async fn set_bot_active(&self, prefix: &str, conversation_id: &str, active: bool, ttl_secs: u64) -> Result<()>;
}
