use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::provider::LlmProvider;
use crate::types::{ChatRequest, ChatResponse};

/// Deterministic provider for tests: records every request it receives and
/// returns a scripted response (or an error) from a queue, falling back to
/// echoing the question when the queue is empty.
pub struct MockLlmProvider {
    responses: Mutex<Vec<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses(responses: Vec<&str>) -> Self {
        let mock = Self::new();
        mock.push_responses(responses);
        mock
    }

    pub fn push_response(&self, body: &str) {
        self.responses.lock().unwrap().push(Ok(body.to_string()));
    }

    pub fn push_responses(&self, bodies: Vec<&str>) {
        for body in bodies {
            self.push_response(body);
        }
    }

    pub fn push_error(&self, message: &str) {
        self.responses.lock().unwrap().push(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(req.clone());

        let scripted = self.responses.lock().unwrap().pop();
        match scripted {
            Some(Ok(content)) => Ok(ChatResponse {
                content,
                model: req.model.clone(),
                tokens_in: req.question.len() as u32,
                tokens_out: 0,
            }),
            Some(Err(message)) => Err(LlmError::Api { status: 500, message }),
            None => Ok(ChatResponse {
                content: req.question.clone(),
                model: req.model.clone(),
                tokens_in: req.question.len() as u32,
                tokens_out: req.question.len() as u32,
            }),
        }
    }
}
