use std::sync::Arc;

use async_trait::async_trait;
use orc_adapter::Handler;
use orc_core::types::Intent;
use orc_core::OrcError;
use orc_llm::{ChatRequest, LlmProvider};
use orc_prompt::{PromptResolver, RenderVars};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::common::format_history;

#[derive(Debug, Deserialize)]
pub struct RouterInput {
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<(String, String)>,
    pub company_id: String,
    pub company_name: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub emergency_keywords: Vec<String>,
    #[serde(default)]
    pub sales_keywords: Vec<String>,
    #[serde(default)]
    pub schedule_keywords: Vec<String>,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouterOutput {
    pub intent: String,
    pub confidence: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    confidence: f32,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

/// Stateless intent classifier (§4.F). One instance serves every tenant —
/// everything tenant-specific arrives through [`RouterInput`].
pub struct RouterHandler {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<dyn PromptResolver>,
}

impl RouterHandler {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<dyn PromptResolver>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl Handler for RouterHandler {
    async fn invoke(&self, inputs: &Value) -> Result<Value, OrcError> {
        let input: RouterInput = serde_json::from_value(inputs.clone())?;

        let keyword_context = format!(
            "emergency: {}\nsales: {}\nschedule: {}",
            input.emergency_keywords.join(", "),
            input.sales_keywords.join(", "),
            input.schedule_keywords.join(", "),
        );
        let history = format_history(&input.chat_history);
        let services = input.services.join(", ");

        let vars = RenderVars {
            question: &input.question,
            chat_history: &history,
            context: &keyword_context,
            company_name: &input.company_name,
            services: &services,
        };
        let template = self.prompts.resolve(&input.company_id, "router");
        let system = orc_prompt::render(&template.body, &vars);

        let request = ChatRequest {
            model: input.model_name.clone(),
            system,
            history: Vec::new(),
            question: input.question.clone(),
            max_tokens: input.max_tokens,
            temperature: input.temperature,
        };

        let response = self
            .llm
            .send(&request)
            .await
            .map_err(|e| OrcError::LlmProvider(e.to_string()))?;

        let output = parse_classification(&response.content);
        Ok(serde_json::to_value(output)?)
    }
}

/// Parse the router's JSON reply; any malformed or out-of-set result
/// defaults to `SUPPORT/0.3` (§4.F, §8 "JSON parse failure").
fn parse_classification(content: &str) -> RouterOutput {
    let parsed: Option<RawClassification> = serde_json::from_str(content).ok();

    match parsed {
        Some(raw) if Intent::parse_canonical(&raw.intent).is_some() => RouterOutput {
            intent: raw.intent,
            confidence: raw.confidence,
            keywords: raw.keywords,
            reasoning: raw.reasoning,
        },
        Some(raw) => {
            warn!(intent = %raw.intent, "router produced an out-of-set intent, folding to support");
            RouterOutput {
                intent: "SUPPORT".to_string(),
                confidence: 0.3,
                keywords: Vec::new(),
                reasoning: String::new(),
            }
        }
        None => {
            warn!(content, "router reply was not valid JSON, defaulting to support");
            RouterOutput {
                intent: "SUPPORT".to_string(),
                confidence: 0.3,
                keywords: Vec::new(),
                reasoning: String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_llm::MockLlmProvider;
    use orc_prompt::StaticPromptResolver;
    use serde_json::json;

    fn handler(mock: MockLlmProvider) -> RouterHandler {
        RouterHandler::new(Arc::new(mock), Arc::new(StaticPromptResolver::empty()))
    }

    fn base_input() -> Value {
        json!({
            "question": "¿Cuánto cuesta el botox?",
            "chat_history": [],
            "company_id": "benova",
            "company_name": "Benova",
            "services": ["botox"],
            "emergency_keywords": [],
            "sales_keywords": ["botox", "precio"],
            "schedule_keywords": [],
            "model_name": "default-chat-model",
            "max_tokens": 256,
            "temperature": 0.3,
        })
    }

    #[tokio::test]
    async fn valid_json_reply_routes_to_classified_intent() {
        let mock = MockLlmProvider::with_responses(vec![Ok(
            r#"{"intent":"SALES","confidence":0.92,"keywords":["botox"],"reasoning":"pricing question"}"#.to_string(),
        )]);
        let handler = handler(mock);
        let out: RouterOutput = serde_json::from_value(handler.invoke(&base_input()).await.unwrap()).unwrap();
        assert_eq!(out.intent, "SALES");
        assert_eq!(out.confidence, 0.92);
    }

    #[tokio::test]
    async fn non_json_reply_defaults_to_support() {
        let mock = MockLlmProvider::with_responses(vec![Ok("not json at all".to_string())]);
        let handler = handler(mock);
        let out: RouterOutput = serde_json::from_value(handler.invoke(&base_input()).await.unwrap()).unwrap();
        assert_eq!(out.intent, "SUPPORT");
        assert_eq!(out.confidence, 0.3);
    }

    #[tokio::test]
    async fn out_of_set_intent_folds_to_support() {
        let mock = MockLlmProvider::with_responses(vec![Ok(
            r#"{"intent":"BILLING","confidence":0.9}"#.to_string(),
        )]);
        let handler = handler(mock);
        let out: RouterOutput = serde_json::from_value(handler.invoke(&base_input()).await.unwrap()).unwrap();
        assert_eq!(out.intent, "SUPPORT");
        assert_eq!(out.confidence, 0.3);
    }
}
