use std::sync::Arc;

use async_trait::async_trait;
use orc_adapter::Handler;
use orc_core::OrcError;
use orc_llm::{ChatRequest, LlmProvider};
use orc_prompt::{PromptResolver, RenderVars};
use orc_retrieval::{join_context, SearchFilter, VectorIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{cap_sentences, format_history};

const MAX_SENTENCES: usize = 4;
const TOP_K: usize = 4;

#[derive(Debug, Deserialize)]
pub struct EmergencyInput {
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<(String, String)>,
    pub company_id: String,
    pub company_name: String,
    #[serde(default)]
    pub services: Vec<String>,
    pub vector_index_name: String,
    #[serde(default)]
    pub emergency_keywords: Vec<String>,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmergencyOutput {
    pub reply: String,
    pub urgency_level: String,
}

/// Emergency specialist (§4.G): retrieval query biased with the tenant's
/// emergency keywords, reply capped to 4 sentences and always ending with
/// the fixed escalation line (§8 scenario 2).
pub struct EmergencyHandler {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<dyn PromptResolver>,
    retrieval: Arc<dyn VectorIndex>,
}

impl EmergencyHandler {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<dyn PromptResolver>, retrieval: Arc<dyn VectorIndex>) -> Self {
        Self { llm, prompts, retrieval }
    }
}

#[async_trait]
impl Handler for EmergencyHandler {
    async fn invoke(&self, inputs: &Value) -> Result<Value, OrcError> {
        let input: EmergencyInput = serde_json::from_value(inputs.clone())?;

        let biased_query = format!("{} {}", input.question, input.emergency_keywords.join(" "));
        let filter = SearchFilter::for_tenant(&input.company_id);
        let docs = self
            .retrieval
            .search(&input.vector_index_name, &biased_query, TOP_K, &filter)
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
        let template = self.prompts.resolve(&input.company_id, "emergency");
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

        let escalation = format!("Escalando tu caso de emergencia en {} ahora mismo. 🚨", input.company_name);
        let mut reply = cap_sentences(&response.content, MAX_SENTENCES);
        if !reply.trim_end().ends_with(&escalation) {
            reply = format!("{reply} {escalation}");
        }

        Ok(serde_json::to_value(EmergencyOutput {
            reply,
            urgency_level: "high".to_string(),
        })?)
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
            "question": "Tengo dolor intenso después del tratamiento",
            "chat_history": [],
            "company_id": "benova",
            "company_name": "Benova",
            "services": [],
            "vector_index_name": "benova_docs",
            "emergency_keywords": ["dolor", "sangrado"],
            "model_name": "default-chat-model",
            "max_tokens": 256,
            "temperature": 0.3,
        })
    }

    #[tokio::test]
    async fn reply_always_ends_with_fixed_escalation_line() {
        let mock = MockLlmProvider::with_responses(vec![Ok("Entiendo tu situación.".to_string())]);
        let handler = EmergencyHandler::new(
            Arc::new(mock),
            Arc::new(StaticPromptResolver::empty()),
            Arc::new(InMemoryVectorIndex::empty()),
        );
        let out: EmergencyOutput = serde_json::from_value(handler.invoke(&base_input()).await.unwrap()).unwrap();
        assert!(out.reply.ends_with("Escalando tu caso de emergencia en Benova ahora mismo. 🚨"));
    }

    #[tokio::test]
    async fn escalation_line_is_not_duplicated_if_llm_already_included_it() {
        let mock = MockLlmProvider::with_responses(vec![Ok(
            "Escalando tu caso de emergencia en Benova ahora mismo. 🚨".to_string(),
        )]);
        let handler = EmergencyHandler::new(
            Arc::new(mock),
            Arc::new(StaticPromptResolver::empty()),
            Arc::new(InMemoryVectorIndex::empty()),
        );
        let out: EmergencyOutput = serde_json::from_value(handler.invoke(&base_input()).await.unwrap()).unwrap();
        assert_eq!(
            out.reply.matches("Escalando tu caso de emergencia").count(),
            1
        );
    }
}
