use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a resolved [`PromptTemplate`] body came from (§3 PromptTemplate).
///
/// Logged for observability but never changes routing behavior — a
/// hardcoded or emergency fallback serves the request exactly like a
/// custom prompt would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Custom,
    Default,
    Hardcoded,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub body: String,
    pub provenance: Provenance,
    pub version: u32,
    pub last_modified: DateTime<Utc>,
}
