use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{OrcError, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Hard cap on node transitions per orchestration request (§4.K, §8).
pub const MAX_GRAPH_TRANSITIONS: u32 = 50;
/// Default sliding-window size for conversation memory (§3 ConversationMemory).
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 10;
/// Default TTL for conversation memory, in seconds (7 days).
pub const DEFAULT_MEMORY_TTL_SECS: i64 = 7 * 24 * 3600;
/// Default TTL for shared-state slots, in seconds (1 hour).
pub const DEFAULT_SHARED_STATE_TTL_SECS: i64 = 3600;
/// TTL for the idempotency key, in seconds (1 hour).
pub const PROCESSED_MESSAGE_TTL_SECS: i64 = 3600;
/// TTL for the bot-status key, in seconds (24 hours).
pub const BOT_STATUS_TTL_SECS: i64 = 24 * 3600;

/// Top-level config (`orc.toml` + `ORC_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrcConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Tenants known at startup, keyed by `company_id`.
    #[serde(default)]
    pub tenants: HashMap<String, TenantConfig>,
    /// Fallback mapping from a platform `account_id` to `company_id`, used by
    /// Tenant Registry resolution step 5 (§4.A) when no other field matches.
    #[serde(default)]
    pub account_id_map: HashMap<String, String>,
}

impl Default for OrcConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            llm: LlmConfig::default(),
            tenants: HashMap::new(),
            account_id_map: HashMap::new(),
        }
    }
}

/// The single OpenAI-compatible completion backend shared by every tenant's
/// agents; per-tenant behavior is steered through `TenantConfig::model_params`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider_name")]
    pub provider_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_name: default_provider_name(),
            api_key: String::new(),
            base_url: default_llm_base_url(),
        }
    }
}

fn default_provider_name() -> String {
    "openai".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl OrcConfig {
    /// Load config from a TOML file with `ORC_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, then `~/.orc/orc.toml`.
    /// A missing file is not an error — defaults are used and a warning is
    /// logged by the caller.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: OrcConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ORC_").split("_"))
            .extract()
            .map_err(|e| OrcError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.orc/orc.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Chatwoot conversation statuses that keep the bot active (§4.L).
    #[serde(default = "default_active_statuses")]
    pub bot_active_statuses: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            bot_active_statuses: default_active_statuses(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_active_statuses() -> Vec<String> {
    vec!["open".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.orc/orc.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `None` disables Redis and forces the in-memory shared-state backend.
    pub url: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: None }
    }
}

/// Per-tenant configuration resolved by the Tenant Registry (§4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub company_id: String,
    pub display_name: String,
    #[serde(default)]
    pub services: Vec<String>,
    pub redis_prefix: String,
    pub vector_index_name: String,
    pub schedule_backend: ScheduleBackendConfig,
    #[serde(default)]
    pub treatment_durations: HashMap<String, TreatmentDuration>,
    #[serde(default)]
    pub keywords: TenantKeywords,
    #[serde(default)]
    pub required_booking_fields: Vec<String>,
    #[serde(default)]
    pub model_params: ModelParams,
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    /// Per-tenant Chatwoot account used for the outbound reply (§6).
    pub chatwoot: ChatwootConfig,
}

/// Credentials for the platform this tenant's conversations live in (§6
/// Outbound platform message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatwootConfig {
    pub base_url: String,
    pub account_id: String,
    pub api_access_token: String,
}

fn default_max_context_messages() -> usize {
    DEFAULT_MAX_CONTEXT_MESSAGES
}

/// Duration and booking shape of a single treatment/service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentDuration {
    pub duration_minutes: u32,
    #[serde(default = "default_sessions")]
    pub sessions: u32,
    #[serde(default)]
    pub deposit: Option<String>,
    #[serde(default)]
    pub agenda_id: Option<String>,
}

fn default_sessions() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TenantKeywords {
    #[serde(default)]
    pub emergency: Vec<String>,
    #[serde(default)]
    pub sales: Vec<String>,
    #[serde(default)]
    pub schedule: Vec<String>,
    #[serde(default)]
    pub support: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_model_name() -> String {
    "default-chat-model".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleBackendConfig {
    pub url: String,
    pub kind: ScheduleBackendKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleBackendKind {
    Generic,
    GoogleCalendar,
    Calendly,
    Webhook,
}
