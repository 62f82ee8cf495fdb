use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use orc_core::config::TenantConfig;
use serde_json::Value;
use tracing::warn;

/// Resolves a `company_id` into a [`TenantConfig`] snapshot and derives a
/// `company_id` from a raw webhook payload (§4.A).
///
/// Tenants are loaded once at startup from [`OrcConfig`](orc_core::config::OrcConfig)
/// and served from an in-memory map; hot-reload is supported by calling
/// [`TenantRegistry::reload`] with a freshly loaded config, which swaps the
/// whole map atomically per entry.
pub struct TenantRegistry {
    tenants: DashMap<String, Arc<TenantConfig>>,
    account_id_map: HashMap<String, String>,
}

impl TenantRegistry {
    pub fn new(tenants: HashMap<String, TenantConfig>, account_id_map: HashMap<String, String>) -> Self {
        let map = DashMap::new();
        for (id, cfg) in tenants {
            map.insert(id, Arc::new(cfg));
        }
        Self {
            tenants: map,
            account_id_map,
        }
    }

    /// Replace the tenant snapshot wholesale (hot reload).
    pub fn reload(&self, tenants: HashMap<String, TenantConfig>) {
        self.tenants.clear();
        for (id, cfg) in tenants {
            self.tenants.insert(id, Arc::new(cfg));
        }
    }

    /// `Get(company_id) -> (TenantConfig, ok)` (§4.A).
    pub fn get(&self, company_id: &str) -> Option<Arc<TenantConfig>> {
        self.tenants.get(company_id).map(|r| r.clone())
    }

    /// `Resolve(webhook_payload) -> company_id` (§4.A).
    ///
    /// First hit wins, in this order:
    /// 1. explicit `company_id` field
    /// 2. `conversation.meta.company_id`
    /// 3. lowercase `conversation.account.name`
    /// 4. `conversation.custom_attributes.company_id`
    /// 5. platform `account_id` mapped through `account_id_map`
    /// 6. `"default"`
    pub fn resolve(&self, payload: &Value) -> String {
        if let Some(id) = payload.get("company_id").and_then(Value::as_str) {
            return id.to_string();
        }

        let conversation = payload.get("conversation");

        if let Some(id) = conversation
            .and_then(|c| c.get("meta"))
            .and_then(|m| m.get("company_id"))
            .and_then(Value::as_str)
        {
            return id.to_string();
        }

        if let Some(name) = conversation
            .and_then(|c| c.get("account"))
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
        {
            return name.to_lowercase();
        }

        if let Some(id) = conversation
            .and_then(|c| c.get("custom_attributes"))
            .and_then(|a| a.get("company_id"))
            .and_then(Value::as_str)
        {
            return id.to_string();
        }

        let account_id = conversation
            .and_then(|c| c.get("account"))
            .and_then(|a| a.get("id"))
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_u64().map(|n| n.to_string())));

        if let Some(account_id) = account_id {
            if let Some(company_id) = self.account_id_map.get(&account_id) {
                return company_id.clone();
            }
        }

        warn!("webhook payload matched no tenant resolution rule, falling back to default");
        "default".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TenantRegistry {
        let mut tenants = HashMap::new();
        tenants.insert(
            "benova".to_string(),
            TenantConfig {
                company_id: "benova".to_string(),
                display_name: "Benova".to_string(),
                services: vec![],
                redis_prefix: "benova:".to_string(),
                vector_index_name: "benova_docs".to_string(),
                schedule_backend: orc_core::config::ScheduleBackendConfig {
                    url: "http://example.invalid".to_string(),
                    kind: orc_core::config::ScheduleBackendKind::Generic,
                },
                treatment_durations: HashMap::new(),
                keywords: Default::default(),
                required_booking_fields: vec![],
                model_params: Default::default(),
                max_context_messages: 10,
                chatwoot: orc_core::config::ChatwootConfig {
                    base_url: "https://chatwoot.example.com".to_string(),
                    account_id: "99".to_string(),
                    api_access_token: "test-token".to_string(),
                },
            },
        );
        let mut account_map = HashMap::new();
        account_map.insert("99".to_string(), "benova".to_string());
        TenantRegistry::new(tenants, account_map)
    }

    #[test]
    fn explicit_company_id_wins() {
        let reg = registry();
        let payload = json!({"company_id": "benova", "conversation": {"account": {"name": "other"}}});
        assert_eq!(reg.resolve(&payload), "benova");
    }

    #[test]
    fn falls_back_through_precedence_chain() {
        let reg = registry();
        let payload = json!({"conversation": {"account": {"name": "Benova"}}});
        assert_eq!(reg.resolve(&payload), "benova");
    }

    #[test]
    fn account_id_map_is_last_resort() {
        let reg = registry();
        let payload = json!({"conversation": {"account": {"id": 99}}});
        assert_eq!(reg.resolve(&payload), "benova");
    }

    #[test]
    fn unmatched_payload_falls_back_to_default() {
        let reg = registry();
        let payload = json!({"conversation": {}});
        assert_eq!(reg.resolve(&payload), "default");
    }

    #[test]
    fn get_returns_registered_tenant() {
        let reg = registry();
        assert!(reg.get("benova").is_some());
        assert!(reg.get("missing").is_none());
    }
}
