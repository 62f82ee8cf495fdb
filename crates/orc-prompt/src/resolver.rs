use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::types::{Provenance, PromptTemplate};

/// A tenant-authored prompt body plus the bookkeeping the admin path
/// maintains for it (§3 PromptTemplate lifecycle).
#[derive(Debug, Clone)]
pub struct StoredPrompt {
    pub body: String,
    pub active: bool,
    pub version: u32,
    pub last_modified: DateTime<Utc>,
}

/// `Resolve(company_id, agent_key) -> PromptTemplate` (§4.B).
///
/// Implementations must never fail: any missing tier falls through to the
/// next, down to the hardcoded emergency template, so every request gets a
/// renderable prompt.
pub trait PromptResolver: Send + Sync {
    fn resolve(&self, company_id: &str, agent_key: &str) -> PromptTemplate;
}

/// In-memory prompt resolver backed by two tenant-keyed maps. A real
/// deployment would source the custom/default tiers from the out-of-scope
/// Prompt Store collaborator (§1); this implementation is the seam that
/// collaborator's resolved output plugs into.
pub struct StaticPromptResolver {
    custom: HashMap<(String, String), StoredPrompt>,
    defaults: HashMap<(String, String), StoredPrompt>,
}

impl StaticPromptResolver {
    pub fn new(
        custom: HashMap<(String, String), StoredPrompt>,
        defaults: HashMap<(String, String), StoredPrompt>,
    ) -> Self {
        Self { custom, defaults }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new(), HashMap::new())
    }
}

impl PromptResolver for StaticPromptResolver {
    fn resolve(&self, company_id: &str, agent_key: &str) -> PromptTemplate {
        let key = (company_id.to_string(), agent_key.to_string());

        if let Some(custom) = self.custom.get(&key) {
            if custom.active {
                return PromptTemplate {
                    body: custom.body.clone(),
                    provenance: Provenance::Custom,
                    version: custom.version,
                    last_modified: custom.last_modified,
                };
            }
            warn!(company_id, agent_key, "custom prompt exists but is inactive, falling through");
        }

        if let Some(default) = self.defaults.get(&key) {
            return PromptTemplate {
                body: default.body.clone(),
                provenance: Provenance::Default,
                version: default.version,
                last_modified: default.last_modified,
            };
        }
        warn!(company_id, agent_key, "no tenant default prompt, falling through to hardcoded");

        if let Some(body) = hardcoded_fallback(agent_key) {
            return PromptTemplate {
                body: body.to_string(),
                provenance: Provenance::Hardcoded,
                version: 0,
                last_modified: Utc::now(),
            };
        }
        warn!(company_id, agent_key, "no hardcoded fallback for agent_key, using emergency template");

        PromptTemplate {
            body: EMERGENCY_TEMPLATE.to_string(),
            provenance: Provenance::Emergency,
            version: 0,
            last_modified: Utc::now(),
        }
    }
}

/// Last-resort template: embeds only `{company_name}` and `{services}`,
/// nothing else (§4.B tier 4).
pub const EMERGENCY_TEMPLATE: &str =
    "Gracias por contactar a {company_name}. Nuestros servicios incluyen: {services}.";

/// Language-neutral fallback bodies, one per agent key (§4.B tier 3).
fn hardcoded_fallback(agent_key: &str) -> Option<&'static str> {
    match agent_key {
        "router" => Some(
            "Classify the user's message into SALES, SUPPORT, EMERGENCY, or SCHEDULE. \
             Message: {question}",
        ),
        "sales" => Some(
            "You are the sales assistant for {company_name}. Services: {services}. \
             Question: {question}. Context: {context}.",
        ),
        "support" => Some(
            "You are the support assistant for {company_name}. \
             Question: {question}. Context: {context}.",
        ),
        "emergency" => Some(
            "You are the emergency triage assistant for {company_name}. \
             Question: {question}. Context: {context}.",
        ),
        "schedule" => Some(
            "You are the scheduling assistant for {company_name}. Services: {services}. \
             Question: {question}. Context: {context}.",
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_through_to_hardcoded_when_nothing_configured() {
        let resolver = StaticPromptResolver::empty();
        let tpl = resolver.resolve("benova", "sales");
        assert_eq!(tpl.provenance, Provenance::Hardcoded);
        assert!(tpl.body.contains("{question}"));
    }

    #[test]
    fn falls_through_to_emergency_for_unknown_agent_key() {
        let resolver = StaticPromptResolver::empty();
        let tpl = resolver.resolve("benova", "not-a-real-agent");
        assert_eq!(tpl.provenance, Provenance::Emergency);
        assert!(tpl.body.contains("{company_name}"));
        assert!(tpl.body.contains("{services}"));
    }

    #[test]
    fn inactive_custom_prompt_falls_through_to_default() {
        let mut custom = HashMap::new();
        custom.insert(
            ("benova".to_string(), "sales".to_string()),
            StoredPrompt {
                body: "inactive body".to_string(),
                active: false,
                version: 1,
                last_modified: Utc::now(),
            },
        );
        let mut defaults = HashMap::new();
        defaults.insert(
            ("benova".to_string(), "sales".to_string()),
            StoredPrompt {
                body: "default body {question}".to_string(),
                active: true,
                version: 1,
                last_modified: Utc::now(),
            },
        );
        let resolver = StaticPromptResolver::new(custom, defaults);
        let tpl = resolver.resolve("benova", "sales");
        assert_eq!(tpl.provenance, Provenance::Default);
        assert_eq!(tpl.body, "default body {question}");
    }

    #[test]
    fn active_custom_prompt_wins() {
        let mut custom = HashMap::new();
        custom.insert(
            ("benova".to_string(), "sales".to_string()),
            StoredPrompt {
                body: "custom body".to_string(),
                active: true,
                version: 3,
                last_modified: Utc::now(),
            },
        );
        let resolver = StaticPromptResolver::new(custom, HashMap::new());
        let tpl = resolver.resolve("benova", "sales");
        assert_eq!(tpl.provenance, Provenance::Custom);
        assert_eq!(tpl.version, 3);
    }
}
