use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: HashMap<String, Value>,
}

/// Search filter: `company_id` is mandatory so every query is tenant-scoped
/// even against shared infrastructure (§5 "Vector indexes are per-tenant").
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub company_id: String,
    pub document_type: Option<String>,
    pub extra: HashMap<String, Value>,
}

impl SearchFilter {
    pub fn for_tenant(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            document_type: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    fn matches(&self, doc: &Document) -> bool {
        let company_matches = doc
            .metadata
            .get("company_id")
            .and_then(Value::as_str)
            .map(|id| id == self.company_id)
            .unwrap_or(false);
        if !company_matches {
            return false;
        }
        if let Some(wanted) = &self.document_type {
            let matches_type = doc
                .metadata
                .get("document_type")
                .and_then(Value::as_str)
                .map(|t| t == wanted)
                .unwrap_or(false);
            if !matches_type {
                return false;
            }
        }
        true
    }
}

pub(crate) fn filter_matches(filter: &SearchFilter, doc: &Document) -> bool {
    filter.matches(doc)
}
