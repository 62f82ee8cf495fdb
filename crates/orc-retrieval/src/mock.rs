use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::index::VectorIndex;
use crate::types::{filter_matches, Document, SearchFilter};

/// Fixed-corpus index for tests and for a degrade-safe default when no
/// real backend is configured (§7 StorageUnavailable: "retrieval returns
/// empty context").
pub struct InMemoryVectorIndex {
    documents: Mutex<Vec<Document>>,
}

impl InMemoryVectorIndex {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search(
        &self,
        _index_name: &str,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<Document>, RetrievalError> {
        let docs = self.documents.lock().unwrap();
        let query_lower = query.to_lowercase();
        let mut matches: Vec<Document> = docs
            .iter()
            .filter(|d| filter_matches(filter, d))
            .filter(|d| query_lower.is_empty() || d.content.to_lowercase().contains(&query_lower))
            .take(k)
            .cloned()
            .collect();

        // Fall back to any tenant-scoped document when nothing matches the
        // query text — a real vector search never returns a hard empty set
        // for an in-scope tenant unless it truly has no documents.
        if matches.is_empty() {
            matches = docs.iter().filter(|d| filter_matches(filter, d)).take(k).cloned().collect();
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn doc(content: &str, company_id: &str, document_type: &str) -> Document {
        let mut metadata = HashMap::new();
        metadata.insert("company_id".to_string(), json!(company_id));
        metadata.insert("document_type".to_string(), json!(document_type));
        Document {
            content: content.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn search_enforces_tenant_isolation() {
        let index = InMemoryVectorIndex::new(vec![
            doc("benova pricing", "benova", "sales"),
            doc("other tenant pricing", "other", "sales"),
        ]);
        let filter = SearchFilter::for_tenant("benova");
        let results = index.search("idx", "pricing", 5, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "benova pricing");
    }

    #[tokio::test]
    async fn document_type_filter_narrows_results() {
        let index = InMemoryVectorIndex::new(vec![
            doc("sales doc", "benova", "sales"),
            doc("support doc", "benova", "support"),
        ]);
        let filter = SearchFilter::for_tenant("benova").with_document_type("support");
        let results = index.search("idx", "", 5, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "support doc");
    }

    #[tokio::test]
    async fn empty_index_returns_empty_results() {
        let index = InMemoryVectorIndex::empty();
        let filter = SearchFilter::for_tenant("benova");
        let results = index.search("idx", "anything", 5, &filter).await.unwrap();
        assert!(results.is_empty());
    }
}
