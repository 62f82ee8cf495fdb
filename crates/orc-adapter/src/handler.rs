use async_trait::async_trait;
use orc_core::OrcError;
use serde_json::Value;

/// The uniform shape every agent and router the Agent Adapter wraps must
/// implement (§4.E): JSON in, JSON out. Router Handler, the four
/// Specialist Handlers, and anything else invoked through the adapter all
/// satisfy this with their own input/output shapes serialized to `Value`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn invoke(&self, inputs: &Value) -> Result<Value, OrcError>;
}
