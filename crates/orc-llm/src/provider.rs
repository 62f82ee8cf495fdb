use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse};

/// The completion backend, kept a black box per the system's scope
/// boundary — any implementation that turns a question plus history into
/// text satisfies the Specialist Handlers and Router Handler.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, LlmError>;
}
