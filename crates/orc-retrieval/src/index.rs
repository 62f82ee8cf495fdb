use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::types::{Document, SearchFilter};

/// Filtered top-k similarity search over tenant-tagged documents (§6).
///
/// Treated as a black box per the system's scope boundary: the system
/// never indexes or embeds documents itself, only queries an index that's
/// populated out of band.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(
        &self,
        index_name: &str,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<Document>, RetrievalError>;
}

/// Join retrieved documents' content into the `{context}` placeholder
/// value the Specialist Handlers' prompts expect.
pub fn join_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
