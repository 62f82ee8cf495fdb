use std::collections::HashMap;

use async_trait::async_trait;
use orc_core::types::{EmergencyInfo, HandoffInfo, PricingInfo, ScheduleInfo, ScheduleStatus, ServiceInfo, SupportInfo, UserInfo};

use crate::error::Result;
use crate::types::StateStats;

/// Per-tenant, per-user typed key-value store, TTL-bound (§4.D).
///
/// `prefix` is always the tenant's `redis_prefix` — callers must never pass
/// a bare `user_id` without it, or keys from different tenants collide.
#[async_trait]
pub trait SharedStateStore: Send + Sync {
    async fn set_pricing(&self, prefix: &str, user_id: &str, service_name: &str, info: PricingInfo) -> Result<()>;
    async fn get_pricing(&self, prefix: &str, user_id: &str, service_name: &str) -> Result<Option<PricingInfo>>;
    async fn get_all_pricing_for_user(&self, prefix: &str, user_id: &str) -> Result<HashMap<String, PricingInfo>>;

    async fn set_schedule(&self, prefix: &str, user_id: &str, info: ScheduleInfo) -> Result<()>;
    async fn get_schedule(&self, prefix: &str, user_id: &str) -> Result<Option<ScheduleInfo>>;
    async fn update_schedule_status(&self, prefix: &str, user_id: &str, status: ScheduleStatus) -> Result<()>;

    async fn set_user(&self, prefix: &str, user_id: &str, patch: UserInfo) -> Result<()>;
    async fn get_user(&self, prefix: &str, user_id: &str) -> Result<Option<UserInfo>>;
    async fn add_intent_to_history(&self, prefix: &str, user_id: &str, intent: &str) -> Result<()>;

    async fn add_service(&self, prefix: &str, user_id: &str, info: ServiceInfo) -> Result<()>;
    async fn get_services(&self, prefix: &str, user_id: &str) -> Result<Vec<ServiceInfo>>;

    async fn add_support(&self, prefix: &str, user_id: &str, info: SupportInfo) -> Result<()>;
    async fn get_support(&self, prefix: &str, user_id: &str) -> Result<Vec<SupportInfo>>;

    async fn set_emergency(&self, prefix: &str, user_id: &str, info: EmergencyInfo) -> Result<()>;
    async fn get_emergency(&self, prefix: &str, user_id: &str) -> Result<Option<EmergencyInfo>>;

    async fn add_handoff(&self, prefix: &str, user_id: &str, info: HandoffInfo) -> Result<()>;
    async fn get_handoffs(&self, prefix: &str, user_id: &str) -> Result<Vec<HandoffInfo>>;
    async fn get_last_handoff(&self, prefix: &str, user_id: &str) -> Result<Option<HandoffInfo>>;

    async fn clear_user_data(&self, prefix: &str, user_id: &str) -> Result<()>;
    async fn stats(&self) -> Result<StateStats>;
}
