use std::collections::HashMap;

use async_trait::async_trait;
use orc_core::types::{EmergencyInfo, HandoffInfo, PricingInfo, ScheduleInfo, ScheduleStatus, ServiceInfo, SupportInfo, UserInfo};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::Result;
use crate::idempotency::IdempotencyStore;
use crate::keys;
use crate::merge::merge_user_info;
use crate::store::SharedStateStore;
use crate::types::StateStats;

/// Production backend: `redis` crate with an auto-reconnecting
/// `ConnectionManager`, same "construct once, share the handle" shape the
/// teacher uses for its SQLite connections.
pub struct RedisStateStore {
    conn: ConnectionManager,
    default_ttl_secs: u64,
}

impl RedisStateStore {
    /// Connect to `url`. Callers should fall back to [`crate::InMemoryStateStore`]
    /// on error and log a warning rather than fail startup (§4.D failure mode).
    pub async fn connect(url: &str, default_ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, default_ttl_secs })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;
        // SET ... EX applies the TTL atomically with the write (§3 invariant:
        // "overwrites reset TTL").
        let _: () = conn.set_ex(key, json, self.default_ttl_secs).await?;
        Ok(())
    }
}

#[async_trait]
impl SharedStateStore for RedisStateStore {
    async fn set_pricing(&self, prefix: &str, user_id: &str, service_name: &str, info: PricingInfo) -> Result<()> {
        let key = keys::pricing(prefix, user_id);
        let mut all: HashMap<String, PricingInfo> = self.get_json(&key).await?.unwrap_or_default();
        all.insert(service_name.to_string(), info);
        self.set_json(&key, &all).await
    }

    async fn get_pricing(&self, prefix: &str, user_id: &str, service_name: &str) -> Result<Option<PricingInfo>> {
        let all: HashMap<String, PricingInfo> = self
            .get_json(&keys::pricing(prefix, user_id))
            .await?
            .unwrap_or_default();
        Ok(all.get(service_name).cloned())
    }

    async fn get_all_pricing_for_user(&self, prefix: &str, user_id: &str) -> Result<HashMap<String, PricingInfo>> {
        Ok(self.get_json(&keys::pricing(prefix, user_id)).await?.unwrap_or_default())
    }

    async fn set_schedule(&self, prefix: &str, user_id: &str, info: ScheduleInfo) -> Result<()> {
        self.set_json(&keys::schedule(prefix, user_id), &info).await
    }

    async fn get_schedule(&self, prefix: &str, user_id: &str) -> Result<Option<ScheduleInfo>> {
        self.get_json(&keys::schedule(prefix, user_id)).await
    }

    async fn update_schedule_status(&self, prefix: &str, user_id: &str, status: ScheduleStatus) -> Result<()> {
        let key = keys::schedule(prefix, user_id);
        match self.get_json::<ScheduleInfo>(&key).await? {
            Some(mut info) => {
                info.status = status;
                self.set_json(&key, &info).await
            }
            None => {
                warn!(user_id, "update_schedule_status called with no existing schedule");
                Ok(())
            }
        }
    }

    async fn set_user(&self, prefix: &str, user_id: &str, patch: UserInfo) -> Result<()> {
        let key = keys::user(prefix, user_id);
        let existing = self.get_json(&key).await?;
        let merged = merge_user_info(existing, patch);
        self.set_json(&key, &merged).await
    }

    async fn get_user(&self, prefix: &str, user_id: &str) -> Result<Option<UserInfo>> {
        self.get_json(&keys::user(prefix, user_id)).await
    }

    async fn add_intent_to_history(&self, prefix: &str, user_id: &str, intent: &str) -> Result<()> {
        let key = keys::user(prefix, user_id);
        let mut current: UserInfo = self.get_json(&key).await?.unwrap_or_else(|| UserInfo {
            user_id: user_id.to_string(),
            name: None,
            phone: None,
            email: None,
            preferences: HashMap::new(),
            intent_history: Vec::new(),
            last_updated: chrono::Utc::now(),
        });
        current.intent_history.push(intent.to_string());
        current.last_updated = chrono::Utc::now();
        self.set_json(&key, &current).await
    }

    async fn add_service(&self, prefix: &str, user_id: &str, info: ServiceInfo) -> Result<()> {
        let key = keys::service(prefix, user_id);
        let mut all: Vec<ServiceInfo> = self.get_json(&key).await?.unwrap_or_default();
        all.push(info);
        self.set_json(&key, &all).await
    }

    async fn get_services(&self, prefix: &str, user_id: &str) -> Result<Vec<ServiceInfo>> {
        Ok(self.get_json(&keys::service(prefix, user_id)).await?.unwrap_or_default())
    }

    async fn add_support(&self, prefix: &str, user_id: &str, info: SupportInfo) -> Result<()> {
        let key = keys::support(prefix, user_id);
        let mut all: Vec<SupportInfo> = self.get_json(&key).await?.unwrap_or_default();
        all.push(info);
        self.set_json(&key, &all).await
    }

    async fn get_support(&self, prefix: &str, user_id: &str) -> Result<Vec<SupportInfo>> {
        Ok(self.get_json(&keys::support(prefix, user_id)).await?.unwrap_or_default())
    }

    async fn set_emergency(&self, prefix: &str, user_id: &str, info: EmergencyInfo) -> Result<()> {
        self.set_json(&keys::emergency(prefix, user_id), &info).await
    }

    async fn get_emergency(&self, prefix: &str, user_id: &str) -> Result<Option<EmergencyInfo>> {
        self.get_json(&keys::emergency(prefix, user_id)).await
    }

    async fn add_handoff(&self, prefix: &str, user_id: &str, info: HandoffInfo) -> Result<()> {
        let key = keys::handoff(prefix, user_id);
        let mut all: Vec<HandoffInfo> = self.get_json(&key).await?.unwrap_or_default();
        all.push(info);
        self.set_json(&key, &all).await
    }

    async fn get_handoffs(&self, prefix: &str, user_id: &str) -> Result<Vec<HandoffInfo>> {
        Ok(self.get_json(&keys::handoff(prefix, user_id)).await?.unwrap_or_default())
    }

    async fn get_last_handoff(&self, prefix: &str, user_id: &str) -> Result<Option<HandoffInfo>> {
        Ok(self.get_handoffs(prefix, user_id).await?.pop())
    }

    async fn clear_user_data(&self, prefix: &str, user_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let keys = keys::all_for_user(prefix, user_id);
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StateStats> {
        // DBSIZE reports the whole logical database, not just our keyspace,
        // but it's the cheapest signal Redis offers without a SCAN sweep.
        let mut conn = self.conn.clone();
        let key_count: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(StateStats {
            backend: "redis",
            key_count,
        })
    }
}

#[async_trait]
impl IdempotencyStore for RedisStateStore {
    async fn claim_message(&self, prefix: &str, conversation_id: &str, message_id: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = keys::processed_message(prefix, conversation_id, message_id);
        // SET key 1 NX EX ttl: atomic claim-or-fail. A nil reply means the key
        // already existed, i.e. this message was already processed.
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(claimed.is_some())
    }

    async fn get_bot_active(&self, prefix: &str, conversation_id: &str) -> Result<Option<bool>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::bot_status(prefix, conversation_id)).await?;
        Ok(raw.map(|v| v == "true"))
    }

    async fn set_bot_active(&self, prefix: &str, conversation_id: &str, active: bool, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(keys::bot_status(prefix, conversation_id), active.to_string(), ttl_secs)
            .await?;
        Ok(())
    }
}
