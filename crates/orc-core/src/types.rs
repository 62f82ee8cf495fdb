use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant identifier. Newtype to prevent accidental cross-tenant key mixing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

impl CompanyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CompanyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
impl From<String> for CompanyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// User identifier, always scoped to a tenant by convention
/// (`"{company_id}_contact_{contact_id}"`, see §4.L).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the canonical `{company_id}_contact_{contact_id}` form (§4.L step 4).
    pub fn for_contact(company_id: &CompanyId, contact_id: &str) -> Self {
        Self(format!("{}_contact_{}", company_id.0, contact_id))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One of the four canonical intents classified by the Router Handler (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Sales,
    Support,
    Emergency,
    Schedule,
}

impl Intent {
    /// Lowercased form used as the node-name suffix for `execute_<intent>` (§4.K).
    pub fn as_lowercase(&self) -> &'static str {
        match self {
            Intent::Sales => "sales",
            Intent::Support => "support",
            Intent::Emergency => "emergency",
            Intent::Schedule => "schedule",
        }
    }

    /// Parse a router-classified intent string. Any value outside the closed
    /// set (including case-insensitive near-misses) maps to `None` — callers
    /// must fall back to `Support` per the spec's Open Question resolution
    /// (out-of-set intents fold to support, see DESIGN.md).
    pub fn parse_canonical(s: &str) -> Option<Self> {
        match s {
            "SALES" => Some(Intent::Sales),
            "SUPPORT" => Some(Intent::Support),
            "EMERGENCY" => Some(Intent::Emergency),
            "SCHEDULE" => Some(Intent::Schedule),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_lowercase().to_uppercase())
    }
}

/// A single turn in the conversation memory sliding window (§3 ConversationMemory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

// ---------------------------------------------------------------------------
// SharedContext slots (§3 SharedContext)
// ---------------------------------------------------------------------------

/// Pricing information for one service, written by the Sales handler and
/// readable by any agent that needs to avoid re-quoting a price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingInfo {
    pub service_name: String,
    pub price: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub payment_methods: Vec<String>,
    #[serde(default)]
    pub promotions: Option<String>,
    pub source_agent: String,
    pub timestamp: DateTime<Utc>,
}

fn default_currency() -> String {
    "COP".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub treatment: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub status: ScheduleStatus,
    pub booking_id: Option<String>,
    pub source_agent: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
    /// Appended to, never overwritten (merge semantics, §4.D `AddIntentToHistory`).
    #[serde(default)]
    pub intent_history: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub mentioned_by_agent: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportInfo {
    pub question_type: String,
    pub question: String,
    pub answer: Option<String>,
    pub resolved: bool,
    pub source_agent: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyInfo {
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub urgency_level: UrgencyLevel,
    pub action_taken: Option<String>,
    pub detected_by_agent: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffInfo {
    pub from_agent: String,
    pub to_agent: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_round_trips_canonical_strings() {
        assert_eq!(Intent::parse_canonical("SALES"), Some(Intent::Sales));
        assert_eq!(Intent::parse_canonical("sales"), None);
        assert_eq!(Intent::parse_canonical("UNKNOWN"), None);
    }

    #[test]
    fn intent_lowercase_matches_node_suffix() {
        assert_eq!(Intent::Schedule.as_lowercase(), "schedule");
    }

    #[test]
    fn user_id_for_contact_matches_convention() {
        let company = CompanyId::from("benova");
        let uid = UserId::for_contact(&company, "42");
        assert_eq!(uid.as_str(), "benova_contact_42");
    }
}
