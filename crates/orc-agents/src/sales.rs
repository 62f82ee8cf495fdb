use std::sync::Arc;

use async_trait::async_trait;
use orc_adapter::Handler;
use orc_core::OrcError;
use orc_llm::{ChatRequest, LlmProvider};
use orc_prompt::{PromptResolver, RenderVars};
use orc_retrieval::{join_context, SearchFilter, VectorIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{cap_sentences, format_history, looks_like_pricing};

const MAX_SENTENCES: usize = 5;
const TOP_K: usize = 4;

#[derive(Debug, Deserialize)]
pub struct SalesInput {
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
pub struct SalesOutput {
    pub reply: String,
    pub has_pricing: bool,
}

/// Sales specialist (§4.G): tenant-filtered retrieval, greeting + ≤3
/// benefits + scheduling CTA, capped at 5 sentences.
pub struct SalesHandler {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<dyn PromptResolver>,
    retrieval: Arc<dyn VectorIndex>,
}

impl SalesHandler {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<dyn PromptResolver>, retrieval: Arc<dyn VectorIndex>) -> Self {
        Self { llm, prompts, retrieval }
    }
}

#[async_trait]
impl Handler for SalesHandler {
    async fn invoke(&self, inputs: &Value) -> Result<Value, OrcError> {
        let input: SalesInput = serde_json::from_value(inputs.clone())?;

        let filter = SearchFilter::for_tenant(&input.company_id);
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
        let template = self.prompts.resolve(&input.company_id, "sales");
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

        let cta = format!("¿Te gustaría agendar tu cita en {}?", input.company_name);
        let mut reply = cap_sentences(&response.content, MAX_SENTENCES);
        if !reply.trim_end().ends_with(&cta) {
            reply = format!("{reply} {cta}");
        }
        let has_pricing = looks_like_pricing(&reply);

        Ok(serde_json::to_value(SalesOutput { reply, has_pricing })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_llm::MockLlmProvider;
    use orc_prompt::StaticPromptResolver;
    use orc_retrieval::InMemoryVectorIndex;
    use serde_json::json;

    fn base_input() -> Value {
        json!({
            "question": "¿Cuánto cuesta el botox?",
            "chat_history": [],
            "company_id": "benova",
            "company_name": "Benova",
            "services": ["botox"],
            "vector_index_name": "benova_docs",
            "model_name": "default-chat-model",
            "max_tokens": 256,
            "temperature": 0.3,
        })
    }

    #[tokio::test]
    async fn appends_cta_and_detects_pricing() {
        let mock = MockLlmProvider::with_responses(vec![Ok(
            "El botox cuesta $350.000 COP e incluye seguimiento.".to_string(),
        )]);
        let handler = SalesHandler::new(
            Arc::new(mock),
            Arc::new(StaticPromptResolver::empty()),
            Arc::new(InMemoryVectorIndex::empty()),
        );
        let out: SalesOutput = serde_json::from_value(handler.invoke(&base_input()).await.unwrap()).unwrap();
        assert!(out.has_pricing);
        assert!(out.reply.ends_with("¿Te gustaría agendar tu cita en Benova?"));
    }

    #[tokio::test]
    async fn reply_is_capped_to_five_sentences() {
        let long_reply = "Uno. Dos. Tres. Cuatro. Cinco. Seis. Siete.".to_string();
        let mock = MockLlmProvider::with_responses(vec![Ok(long_reply)]);
        let handler = SalesHandler::new(
            Arc::new(mock),
            Arc::new(StaticPromptResolver::empty()),
            Arc::new(InMemoryVectorIndex::empty()),
        );
        let out: SalesOutput = serde_json::from_value(handler.invoke(&base_input()).await.unwrap()).unwrap();
        let sentence_count = out.reply.matches(['.', '!', '?']).count();
        assert!(sentence_count <= MAX_SENTENCES + 1, "cta adds at most one more sentence");
    }
}
