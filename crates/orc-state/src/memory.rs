use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use orc_core::types::{EmergencyInfo, HandoffInfo, PricingInfo, ScheduleInfo, ScheduleStatus, ServiceInfo, SupportInfo, UserInfo};
use tracing::warn;

use crate::error::Result;
use crate::idempotency::IdempotencyStore;
use crate::keys;
use crate::merge::merge_user_info;
use crate::store::SharedStateStore;
use crate::types::StateStats;

struct Entry {
    json: String,
    expires_at: Instant,
}

/// In-memory backend (testing, and the Redis-unavailable fallback).
///
/// Teacher's documented stance (see `skynet-sessions::SessionManager`): a
/// single `Mutex` around the whole map is simpler than fine-grained
/// per-key locking and is not a bottleneck at this scale.
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<String, Entry>>,
    default_ttl: Duration,
}

impl InMemoryStateStore {
    pub fn new(default_ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Duration::from_secs(default_ttl_secs),
        }
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.json.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_raw(&self, key: &str, json: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                json,
                expires_at: Instant::now() + self.default_ttl,
            },
        );
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_raw(key, serde_json::to_string(value)?);
        Ok(())
    }

    fn set_raw_ttl(&self, key: &str, json: String, ttl_secs: u64) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                json,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
    }

    /// Inserts `key` only if absent or expired. Returns whether this call made the claim.
    fn claim_raw(&self, key: &str, ttl_secs: u64) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return false;
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                json: "1".to_string(),
                expires_at: now + Duration::from_secs(ttl_secs),
            },
        );
        true
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryStateStore {
    async fn claim_message(&self, prefix: &str, conversation_id: &str, message_id: &str, ttl_secs: u64) -> Result<bool> {
        Ok(self.claim_raw(&keys::processed_message(prefix, conversation_id, message_id), ttl_secs))
    }

    async fn get_bot_active(&self, prefix: &str, conversation_id: &str) -> Result<Option<bool>> {
        Ok(self.get_raw(&keys::bot_status(prefix, conversation_id)).map(|v| v == "true"))
    }

    async fn set_bot_active(&self, prefix: &str, conversation_id: &str, active: bool, ttl_secs: u64) -> Result<()> {
        self.set_raw_ttl(&keys::bot_status(prefix, conversation_id), active.to_string(), ttl_secs);
        Ok(())
    }
}

#[async_trait]
impl SharedStateStore for InMemoryStateStore {
    async fn set_pricing(&self, prefix: &str, user_id: &str, service_name: &str, info: PricingInfo) -> Result<()> {
        let key = keys::pricing(prefix, user_id);
        let mut all: HashMap<String, PricingInfo> = self.get_json(&key)?.unwrap_or_default();
        all.insert(service_name.to_string(), info);
        self.set_json(&key, &all)
    }

    async fn get_pricing(&self, prefix: &str, user_id: &str, service_name: &str) -> Result<Option<PricingInfo>> {
        let all: HashMap<String, PricingInfo> = self
            .get_json(&keys::pricing(prefix, user_id))?
            .unwrap_or_default();
        Ok(all.get(service_name).cloned())
    }

    async fn get_all_pricing_for_user(&self, prefix: &str, user_id: &str) -> Result<HashMap<String, PricingInfo>> {
        Ok(self.get_json(&keys::pricing(prefix, user_id))?.unwrap_or_default())
    }

    async fn set_schedule(&self, prefix: &str, user_id: &str, info: ScheduleInfo) -> Result<()> {
        self.set_json(&keys::schedule(prefix, user_id), &info)
    }

    async fn get_schedule(&self, prefix: &str, user_id: &str) -> Result<Option<ScheduleInfo>> {
        self.get_json(&keys::schedule(prefix, user_id))
    }

    async fn update_schedule_status(&self, prefix: &str, user_id: &str, status: ScheduleStatus) -> Result<()> {
        let key = keys::schedule(prefix, user_id);
        match self.get_json::<ScheduleInfo>(&key)? {
            Some(mut info) => {
                info.status = status;
                self.set_json(&key, &info)
            }
            None => {
                warn!(user_id, "update_schedule_status called with no existing schedule");
                Ok(())
            }
        }
    }

    async fn set_user(&self, prefix: &str, user_id: &str, patch: UserInfo) -> Result<()> {
        let key = keys::user(prefix, user_id);
        let existing = self.get_json(&key)?;
        let merged = merge_user_info(existing, patch);
        self.set_json(&key, &merged)
    }

    async fn get_user(&self, prefix: &str, user_id: &str) -> Result<Option<UserInfo>> {
        self.get_json(&keys::user(prefix, user_id))
    }

    async fn add_intent_to_history(&self, prefix: &str, user_id: &str, intent: &str) -> Result<()> {
        let key = keys::user(prefix, user_id);
        let mut current: UserInfo = self.get_json(&key)?.unwrap_or_else(|| UserInfo {
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
        self.set_json(&key, &current)
    }

    async fn add_service(&self, prefix: &str, user_id: &str, info: ServiceInfo) -> Result<()> {
        let key = keys::service(prefix, user_id);
        let mut all: Vec<ServiceInfo> = self.get_json(&key)?.unwrap_or_default();
        all.push(info);
        self.set_json(&key, &all)
    }

    async fn get_services(&self, prefix: &str, user_id: &str) -> Result<Vec<ServiceInfo>> {
        Ok(self.get_json(&keys::service(prefix, user_id))?.unwrap_or_default())
    }

    async fn add_support(&self, prefix: &str, user_id: &str, info: SupportInfo) -> Result<()> {
        let key = keys::support(prefix, user_id);
        let mut all: Vec<SupportInfo> = self.get_json(&key)?.unwrap_or_default();
        all.push(info);
        self.set_json(&key, &all)
    }

    async fn get_support(&self, prefix: &str, user_id: &str) -> Result<Vec<SupportInfo>> {
        Ok(self.get_json(&keys::support(prefix, user_id))?.unwrap_or_default())
    }

    async fn set_emergency(&self, prefix: &str, user_id: &str, info: EmergencyInfo) -> Result<()> {
        self.set_json(&keys::emergency(prefix, user_id), &info)
    }

    async fn get_emergency(&self, prefix: &str, user_id: &str) -> Result<Option<EmergencyInfo>> {
        self.get_json(&keys::emergency(prefix, user_id))
    }

    async fn add_handoff(&self, prefix: &str, user_id: &str, info: HandoffInfo) -> Result<()> {
        let key = keys::handoff(prefix, user_id);
        let mut all: Vec<HandoffInfo> = self.get_json(&key)?.unwrap_or_default();
        all.push(info);
        self.set_json(&key, &all)
    }

    async fn get_handoffs(&self, prefix: &str, user_id: &str) -> Result<Vec<HandoffInfo>> {
        Ok(self.get_json(&keys::handoff(prefix, user_id))?.unwrap_or_default())
    }

    async fn get_last_handoff(&self, prefix: &str, user_id: &str) -> Result<Option<HandoffInfo>> {
        Ok(self.get_handoffs(prefix, user_id).await?.pop())
    }

    async fn clear_user_data(&self, prefix: &str, user_id: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        for key in keys::all_for_user(prefix, user_id) {
            entries.remove(&key);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<StateStats> {
        let entries = self.entries.lock().unwrap();
        Ok(StateStats {
            backend: "memory",
            key_count: entries.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn store() -> InMemoryStateStore {
        InMemoryStateStore::new(3600)
    }

    #[tokio::test]
    async fn pricing_is_keyed_by_service_and_scoped_to_user() {
        let s = store();
        s.set_pricing(
            "benova:",
            "u1",
            "botox",
            PricingInfo {
                service_name: "botox".to_string(),
                price: "500000".to_string(),
                currency: "COP".to_string(),
                payment_methods: vec!["card".to_string()],
                promotions: None,
                source_agent: "sales".to_string(),
                timestamp: Utc::now(),
            },
        )
        .await
        .unwrap();
        let got = s.get_pricing("benova:", "u1", "botox").await.unwrap();
        assert_eq!(got.unwrap().price, "500000");
        assert!(s.get_pricing("benova:", "u1", "facial").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_user_merges_with_existing_record() {
        let s = store();
        s.set_user(
            "benova:",
            "u1",
            UserInfo {
                user_id: "u1".to_string(),
                name: Some("Ana".to_string()),
                phone: None,
                email: None,
                preferences: HashMap::new(),
                intent_history: vec!["SALES".to_string()],
                last_updated: Utc::now(),
            },
        )
        .await
        .unwrap();
        s.add_intent_to_history("benova:", "u1", "SCHEDULE").await.unwrap();
        let user = s.get_user("benova:", "u1").await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Ana"));
        assert_eq!(user.intent_history, vec!["SALES", "SCHEDULE"]);
    }

    #[tokio::test]
    async fn last_handoff_is_most_recently_added() {
        let s = store();
        for to in ["support", "schedule"] {
            s.add_handoff(
                "benova:",
                "u1",
                HandoffInfo {
                    from_agent: "sales".to_string(),
                    to_agent: to.to_string(),
                    reason: "test".to_string(),
                    timestamp: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
        let last = s.get_last_handoff("benova:", "u1").await.unwrap().unwrap();
        assert_eq!(last.to_agent, "schedule");
        assert_eq!(s.get_handoffs("benova:", "u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_user_data_removes_every_slot() {
        let s = store();
        s.set_schedule(
            "benova:",
            "u1",
            ScheduleInfo {
                treatment: "cleaning".to_string(),
                date: None,
                time: None,
                patient_name: None,
                patient_phone: None,
                status: ScheduleStatus::Pending,
                booking_id: None,
                source_agent: "schedule".to_string(),
                timestamp: Utc::now(),
            },
        )
        .await
        .unwrap();
        s.clear_user_data("benova:", "u1").await.unwrap();
        assert!(s.get_schedule("benova:", "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_message_is_one_shot() {
        let s = store();
        assert!(s.claim_message("benova:", "conv1", "msg1", 3600).await.unwrap());
        assert!(!s.claim_message("benova:", "conv1", "msg1", 3600).await.unwrap());
        assert!(s.claim_message("benova:", "conv1", "msg2", 3600).await.unwrap());
    }

    #[tokio::test]
    async fn bot_status_defaults_to_unset_then_reflects_last_write() {
        let s = store();
        assert_eq!(s.get_bot_active("benova:", "conv1").await.unwrap(), None);
        s.set_bot_active("benova:", "conv1", false, 86400).await.unwrap();
        assert_eq!(s.get_bot_active("benova:", "conv1").await.unwrap(), Some(false));
        s.set_bot_active("benova:", "conv1", true, 86400).await.unwrap();
        assert_eq!(s.get_bot_active("benova:", "conv1").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn tenant_prefixes_isolate_identical_user_ids() {
        let s = store();
        s.set_user(
            "tenant-a:",
            "u1",
            UserInfo {
                user_id: "u1".to_string(),
                name: Some("Tenant A user".to_string()),
                phone: None,
                email: None,
                preferences: HashMap::new(),
                intent_history: vec![],
                last_updated: Utc::now(),
            },
        )
        .await
        .unwrap();
        let other = s.get_user("tenant-b:", "u1").await.unwrap();
        assert!(other.is_none());
    }
}
