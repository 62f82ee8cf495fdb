use std::sync::Arc;

use async_trait::async_trait;
use orc_adapter::Handler;
use orc_core::OrcError;
use orc_llm::{ChatRequest, LlmProvider};
use orc_prompt::{PromptResolver, RenderVars};
use orc_retrieval::{join_context, SearchFilter, VectorIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::format_history;

const TOP_K: usize = 4;

/// Question types that suggest an unresolved problem warranting a support
/// ticket, used by `validate_output`'s `create_ticket` routing (§4.K).
const PROBLEM_KEYWORDS: &[&str] = &["no funciona", "problema", "queja", "reclamo", "error", "falla"];

#[derive(Debug, Deserialize)]
pub struct SupportInput {
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<(String, String)>,
    pub company_id: String,
    pub company_name: String,
    #[serde(default)]
    pub services: Vec<String>,
    pub vector_index_name: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupportOutput {
    pub reply: String,
    pub question_type: String,
    pub needs_ticket: bool,
}

/// Support specialist (§4.G): generic Q&A with optional `document_type=support`
/// filtered retrieval; escalation wording lives in the prompt itself.
pub struct SupportHandler {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<dyn PromptResolver>,
    retrieval: Arc<dyn VectorIndex>,
}

impl SupportHandler {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<dyn PromptResolver>, retrieval: Arc<dyn VectorIndex>) -> Self {
        Self { llm, prompts, retrieval }
    }
}

#[async_trait]
impl Handler for SupportHandler {
    async fn invoke(&self, inputs: &Value) -> Result<Value, OrcError> {
        let input: SupportInput = serde_json::from_value(inputs.clone())?;

        let filter = SearchFilter::for_tenant(&input.company_id).with_document_type("support");
        let docs = self
            .retrieval
            .search(&input.vector_index_name, &input.question, TOP_K, &filter)
            .await
            .map_err(|e| OrcError::Internal(e.to_string()))?;
        let context = join_context(&docs);

        let history = format_history(&input.chat_history);
        let services = input.services.join(", ");
        let vars = RenderVars {
            question: &input.question,
            chat_history: &history,
            context: &context,
            company_name: &input.company_name,
            services: &services,
        };
        let template = self.prompts.resolve(&input.company_id, "support");
        let system = orc_prompt::render(&template.body, &vars);

        let request = ChatRequest {
            model: input.model_name.clone(),
            system,
            history: Vec::new(),
            question: input.question.clone(),
            max_tokens: input.max_tokens,
            temperature: input.temperature,
        };
        let response = self.llm.send(&request).await.map_err(|e| OrcError::LlmProvider(e.to_string()))?;

        let lowered = input.question.to_lowercase();
        let needs_ticket = PROBLEM_KEYWORDS.iter().any(|kw| lowered.contains(kw));

        Ok(serde_json::to_value(SupportOutput {
            reply: response.content,
            question_type: "general".to_string(),
            needs_ticket,
        })?)
    }
}
